//! Content repository held entirely in memory.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use super::{
    ContentItem, ContentRepository, Corpus, ItemId, ItemQuery, Permalinks, Taxonomy, Term,
    TermId, UrlTarget,
};
use crate::error::Result;

/// Repository over a loaded [`Corpus`]. Items are served in ascending id order.
pub struct InMemoryContentRepository {
    items: Vec<ContentItem>,
    taxonomies: HashMap<String, Taxonomy>,
    /// kind → taxonomy names in registration order
    registrations: HashMap<String, Vec<String>>,
    /// term id → (taxonomy, term)
    terms: HashMap<TermId, (String, Term)>,
    assignments: HashMap<ItemId, Vec<TermId>>,
    permalinks: Permalinks,
}

impl InMemoryContentRepository {
    pub fn new(corpus: Corpus, permalinks: Permalinks) -> Self {
        let mut items = corpus.items;
        items.sort_by_key(|item| item.id);

        let mut taxonomies = HashMap::new();
        let mut registrations: HashMap<String, Vec<String>> = HashMap::new();
        for def in corpus.taxonomies {
            for kind in &def.kinds {
                registrations.entry(kind.clone()).or_default().push(def.name.clone());
            }
            taxonomies.insert(
                def.name.clone(),
                Taxonomy {
                    name: def.name,
                    label: def.label,
                },
            );
        }

        let terms = corpus
            .terms
            .into_iter()
            .map(|t| (t.id, (t.taxonomy, Term { id: t.id, name: t.name })))
            .collect();

        let mut assignments: HashMap<ItemId, Vec<TermId>> = HashMap::new();
        for assignment in corpus.assignments {
            let entry = assignments.entry(assignment.item).or_default();
            for term in assignment.terms {
                if !entry.contains(&term) {
                    entry.push(term);
                }
            }
        }

        Self {
            items,
            taxonomies,
            registrations,
            terms,
            assignments,
            permalinks,
        }
    }

    fn item_term_ids(&self, id: ItemId) -> HashSet<TermId> {
        self.assignments
            .get(&id)
            .map(|terms| terms.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn list_items(&self, kinds: &[String]) -> Result<Vec<ContentItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| kinds.contains(&item.kind))
            .cloned()
            .collect())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<ContentItem>> {
        Ok(self.items.iter().find(|item| item.id == id).cloned())
    }

    async fn list_children(&self, parent_id: ItemId, kind: &str) -> Result<Vec<ContentItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| item.parent_id == Some(parent_id) && item.kind == kind)
            .cloned()
            .collect())
    }

    async fn resolve_url(&self, url: &str) -> Result<Option<ItemId>> {
        let resolved = match self.permalinks.parse(url) {
            Some(UrlTarget::Id(id)) => self.items.iter().find(|item| item.id == id),
            Some(UrlTarget::Slug(slug)) => self.items.iter().find(|item| item.slug == slug),
            None => None,
        };
        Ok(resolved.map(|item| item.id))
    }

    fn permalink(&self, item: &ContentItem) -> String {
        self.permalinks.canonical(&item.slug)
    }

    async fn taxonomies_for_kind(&self, kind: &str) -> Result<Vec<Taxonomy>> {
        Ok(self
            .registrations
            .get(kind)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.taxonomies.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn item_terms(&self, item_id: ItemId, taxonomy: &str) -> Result<Vec<Term>> {
        let Some(assigned) = self.assignments.get(&item_id) else {
            return Ok(Vec::new());
        };
        Ok(assigned
            .iter()
            .filter_map(|id| self.terms.get(id))
            .filter(|(tax, _)| tax == taxonomy)
            .map(|(_, term)| term.clone())
            .collect())
    }

    async fn search_items(&self, query: &ItemQuery) -> Result<Vec<ContentItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| query.matches(item, &self.item_term_ids(item.id)))
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Assignment, TaxonomyDef, TermDef};

    fn item(id: ItemId, kind: &str, slug: &str, parent: Option<ItemId>) -> ContentItem {
        ContentItem {
            id,
            title: slug.to_uppercase(),
            kind: kind.to_string(),
            slug: slug.to_string(),
            body: String::new(),
            excerpt: String::new(),
            parent_id: parent,
        }
    }

    fn repo() -> InMemoryContentRepository {
        let corpus = Corpus {
            items: vec![
                item(3, "page", "child", Some(1)),
                item(1, "page", "root", None),
                item(2, "post", "news", None),
                item(4, "post", "stray", Some(1)),
            ],
            taxonomies: vec![
                TaxonomyDef {
                    name: "category".to_string(),
                    label: Some("Category".to_string()),
                    kinds: vec!["post".to_string()],
                },
                TaxonomyDef {
                    name: "post_tag".to_string(),
                    label: Some("Tag".to_string()),
                    kinds: vec!["post".to_string(), "page".to_string()],
                },
            ],
            terms: vec![
                TermDef { id: 10, taxonomy: "category".to_string(), name: "News".to_string() },
                TermDef { id: 20, taxonomy: "post_tag".to_string(), name: "rust".to_string() },
            ],
            assignments: vec![Assignment { item: 2, terms: vec![10, 20, 10] }],
        };
        InMemoryContentRepository::new(corpus, Permalinks::new("https://example.com").unwrap())
    }

    #[tokio::test]
    async fn test_list_items_sorted_by_id() {
        let repo = repo();
        let items = repo.list_items(&["page".to_string(), "post".to_string()]).await.unwrap();
        let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_children_filtered_by_kind() {
        let repo = repo();
        let children = repo.list_children(1, "page").await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, 3);
    }

    #[tokio::test]
    async fn test_resolve_url() {
        let repo = repo();
        assert_eq!(repo.resolve_url("/news/").await.unwrap(), Some(2));
        assert_eq!(repo.resolve_url("https://example.com/?p=3").await.unwrap(), Some(3));
        assert_eq!(repo.resolve_url("/?p=99").await.unwrap(), None);
        assert_eq!(repo.resolve_url("https://elsewhere.net/news/").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_taxonomy_registration_order() {
        let repo = repo();
        let names: Vec<String> = repo
            .taxonomies_for_kind("post")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["category", "post_tag"]);
        assert!(repo.taxonomies_for_kind("recipe").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_item_terms_deduplicated_per_taxonomy() {
        let repo = repo();
        let terms = repo.item_terms(2, "category").await.unwrap();
        assert_eq!(terms, vec![Term { id: 10, name: "News".to_string() }]);
        assert!(repo.item_terms(1, "category").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_terms() {
        let repo = repo();
        let found = repo
            .search_items(&ItemQuery::new(10).with_any_term([20]))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let capped = repo.search_items(&ItemQuery::new(2)).await.unwrap();
        assert_eq!(capped.len(), 2);
    }
}
