//! Per-item taxonomy lookups with a build-scoped cache.

use std::collections::{BTreeSet, HashMap};

use super::TaxonomyTerms;
use crate::content::{ContentItem, ContentRepository, ItemId, Taxonomy, Term, TermId};
use crate::error::Result;

/// Caches taxonomy registrations and term assignments for the lifetime of one
/// graph build. Not shared between builds.
pub struct TaxonomyIndexer<'a> {
    repo: &'a dyn ContentRepository,
    registered: HashMap<String, Vec<Taxonomy>>,
    assigned: HashMap<(ItemId, String), Vec<Term>>,
}

impl<'a> TaxonomyIndexer<'a> {
    pub fn new(repo: &'a dyn ContentRepository) -> Self {
        Self {
            repo,
            registered: HashMap::new(),
            assigned: HashMap::new(),
        }
    }

    async fn taxonomies(&mut self, kind: &str) -> Result<Vec<Taxonomy>> {
        if let Some(cached) = self.registered.get(kind) {
            return Ok(cached.clone());
        }
        let taxonomies = self.repo.taxonomies_for_kind(kind).await?;
        self.registered.insert(kind.to_string(), taxonomies.clone());
        Ok(taxonomies)
    }

    async fn terms(&mut self, item: ItemId, taxonomy: &str) -> Result<Vec<Term>> {
        let key = (item, taxonomy.to_string());
        if let Some(cached) = self.assigned.get(&key) {
            return Ok(cached.clone());
        }
        let terms = self.repo.item_terms(item, taxonomy).await?;
        self.assigned.insert(key, terms.clone());
        Ok(terms)
    }

    /// All term ids assigned to `item` across the taxonomies registered for its kind.
    pub async fn term_ids_of(&mut self, item: &ContentItem) -> Result<BTreeSet<TermId>> {
        let mut ids = BTreeSet::new();
        for taxonomy in self.taxonomies(&item.kind).await? {
            ids.extend(self.terms(item.id, &taxonomy.name).await?.iter().map(|t| t.id));
        }
        Ok(ids)
    }

    /// Node enrichment: one entry per labelled taxonomy the item has terms in.
    pub async fn summary_of(&mut self, item: &ContentItem) -> Result<Vec<TaxonomyTerms>> {
        let mut summary = Vec::new();
        for taxonomy in self.taxonomies(&item.kind).await? {
            let terms = self.terms(item.id, &taxonomy.name).await?;
            if terms.is_empty() {
                continue;
            }
            let Some(label) = taxonomy.label else {
                log::debug!("Taxonomy {} has no label; omitted from item {}", taxonomy.name, item.id);
                continue;
            };
            summary.push(TaxonomyTerms {
                taxonomy: label,
                terms: terms.into_iter().map(|t| t.name).collect(),
            });
        }
        Ok(summary)
    }

    /// First taxonomy registered for `first`'s kind in which both items carry
    /// a term of the same name, with those names in `first`'s order.
    ///
    /// Works on names, not ids, so it can return `None` even when the items'
    /// term-id sets intersect.
    pub async fn shared_taxonomy_of(
        &mut self,
        first: &ContentItem,
        second: &ContentItem,
    ) -> Result<Option<TaxonomyTerms>> {
        for taxonomy in self.taxonomies(&first.kind).await? {
            let first_terms = self.terms(first.id, &taxonomy.name).await?;
            if first_terms.is_empty() {
                continue;
            }
            let second_terms = self.terms(second.id, &taxonomy.name).await?;

            let mut shared: Vec<String> = Vec::new();
            for term in first_terms {
                if second_terms.iter().any(|t| t.name == term.name) && !shared.contains(&term.name) {
                    shared.push(term.name);
                }
            }
            if shared.is_empty() {
                continue;
            }

            match taxonomy.label {
                Some(label) => return Ok(Some(TaxonomyTerms { taxonomy: label, terms: shared })),
                None => log::debug!(
                    "Taxonomy {} has no label; skipped for items {} and {}",
                    taxonomy.name,
                    first.id,
                    second.id
                ),
            }
        }
        Ok(None)
    }
}
