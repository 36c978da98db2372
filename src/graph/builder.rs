//! Full-corpus and local-neighbourhood graph construction.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{
    Direction, FullEdge, FullGraph, FullNode, LinkExtractor, LocalEdge, LocalGraph, LocalNode,
    PairStrategyKind, Relationship, TaxonomyIndexer, TaxonomyTerms,
};
use crate::config::GraphConfig;
use crate::content::{trim_words, ContentItem, ContentRepository, ItemId, ItemQuery};
use crate::error::{GraphviewError, Result};

/// Tuning knobs for a build. `kinds` and `max_edges` are per-call arguments.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub excerpt_words: usize,
    /// Cap on shared-taxonomy candidates fetched for a local graph.
    pub related_limit: usize,
    /// Cap on incoming-link candidates fetched for a local graph.
    pub incoming_limit: usize,
    pub pair_strategy: PairStrategyKind,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            excerpt_words: 20,
            related_limit: 10,
            incoming_limit: 10,
            pair_strategy: PairStrategyKind::Pairwise,
        }
    }
}

impl From<&GraphConfig> for BuildOptions {
    fn from(config: &GraphConfig) -> Self {
        Self {
            excerpt_words: config.excerpt_words,
            related_limit: config.related_limit,
            incoming_limit: config.incoming_limit,
            pair_strategy: config.pair_strategy,
        }
    }
}

/// An item connected to the focal item of a local graph.
#[derive(Debug, Clone)]
struct Candidate {
    item: ContentItem,
    relationship: Relationship,
    direction: Direction,
    shared_terms: Option<TaxonomyTerms>,
}

impl Candidate {
    fn outgoing(item: ContentItem, relationship: Relationship) -> Self {
        Self {
            item,
            relationship,
            direction: Direction::Outgoing,
            shared_terms: None,
        }
    }
}

/// Full-graph edges whose endpoints are both nodes of the graph.
struct FullEdges<'t> {
    titles: HashMap<ItemId, &'t str>,
    edges: Vec<FullEdge>,
    dropped: usize,
}

impl<'t> FullEdges<'t> {
    fn new(items: &'t [ContentItem]) -> Self {
        Self {
            titles: items.iter().map(|item| (item.id, item.title.as_str())).collect(),
            edges: Vec::new(),
            dropped: 0,
        }
    }

    fn push(
        &mut self,
        relationship: Relationship,
        source: ItemId,
        target: ItemId,
        shared_terms: Option<TaxonomyTerms>,
    ) {
        let (Some(source_title), Some(target_title)) =
            (self.titles.get(&source), self.titles.get(&target))
        else {
            log::debug!(
                "Dropping {} edge {} -> {}: endpoint outside the graph",
                relationship,
                source,
                target
            );
            self.dropped += 1;
            return;
        };

        let id = match relationship {
            // (source, target) can repeat for links; the others are unique per pass
            Relationship::InternalLink => format!(
                "{}-{}-{}-{}",
                relationship,
                source,
                target,
                Uuid::new_v4().simple()
            ),
            _ => format!("{}-{}-{}", relationship, source, target),
        };

        self.edges.push(FullEdge {
            id,
            source: source.to_string(),
            target: target.to_string(),
            relationship,
            source_title: source_title.to_string(),
            target_title: target_title.to_string(),
            shared_terms,
        });
    }
}

/// Builds graphs from a content repository. Each call owns its own state; a
/// builder can be reused and shared across concurrent requests.
pub struct GraphBuilder<'a> {
    repo: &'a dyn ContentRepository,
    options: BuildOptions,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(repo: &'a dyn ContentRepository, options: BuildOptions) -> Self {
        Self { repo, options }
    }

    /// Graph of every item of `kinds` with all parent, child, internal-link and
    /// shared-taxonomy relationships. Fails as a whole if any fetch fails.
    pub async fn build_full(&self, kinds: &[String]) -> Result<FullGraph> {
        let items = self.repo.list_items(kinds).await?;
        let mut indexer = TaxonomyIndexer::new(self.repo);
        let mut graph = FullGraph::default();

        for item in &items {
            let summary_source = if item.excerpt.trim().is_empty() {
                &item.body
            } else {
                &item.excerpt
            };
            graph.push_node(FullNode {
                id: item.id.to_string(),
                label: item.title.clone(),
                kind: item.kind.clone(),
                excerpt: trim_words(summary_source, self.options.excerpt_words),
                taxonomies: indexer.summary_of(item).await?,
            });
        }

        let links = LinkExtractor::new(self.repo);
        let mut edges = FullEdges::new(&items);

        // Parent and child edges are derived independently, so a pair inside the
        // graph is reported once from each side.
        for item in &items {
            if let Some(parent) = item.parent_id {
                edges.push(Relationship::Parent, item.id, parent, None);
            }
            for child in self.repo.list_children(item.id, &item.kind).await? {
                edges.push(Relationship::Child, item.id, child.id, None);
            }
            for target in links.resolve_targets(item.id, &item.body).await? {
                edges.push(Relationship::InternalLink, item.id, target, None);
            }
        }

        let mut term_sets = Vec::with_capacity(items.len());
        for item in &items {
            term_sets.push(indexer.term_ids_of(item).await?);
        }
        let pairs = self.options.pair_strategy.strategy().candidate_pairs(&term_sets);
        log::debug!("{} item pairs share at least one term", pairs.len());

        for (i, j) in pairs {
            let (first, second) = (&items[i], &items[j]);
            let shared = indexer.shared_taxonomy_of(first, second).await?;
            edges.push(Relationship::SharedTaxonomy, first.id, second.id, shared);
        }

        let FullEdges { edges, dropped, .. } = edges;
        for edge in edges {
            graph.push_edge(edge);
        }

        log::info!(
            "Built full graph: {} nodes, {} edges ({} dropped)",
            graph.nodes.len(),
            graph.edges.len(),
            dropped
        );
        Ok(graph)
    }

    /// Neighbourhood of `focal_id` with at most `max_edges` connected entries,
    /// kept in discovery order: parent, children, outgoing links, incoming
    /// links, shared taxonomy.
    pub async fn build_local(&self, focal_id: ItemId, max_edges: usize) -> Result<LocalGraph> {
        let focal = self
            .repo
            .get_item(focal_id)
            .await?
            .ok_or(GraphviewError::ItemNotFound(focal_id))?;

        let candidates = self.connected_items(&focal, max_edges).await?;

        let mut graph = LocalGraph::default();
        graph.push_node(LocalNode {
            id: focal.id.to_string(),
            label: focal.title.clone(),
            kind: focal.kind.clone(),
            is_current: true,
        });

        let mut seen = HashSet::from([focal.id]);
        for (position, candidate) in candidates.into_iter().enumerate() {
            if seen.insert(candidate.item.id) {
                graph.push_node(LocalNode {
                    id: candidate.item.id.to_string(),
                    label: candidate.item.title.clone(),
                    kind: candidate.item.kind.clone(),
                    is_current: false,
                });
            }

            let (source, target) = candidate.direction.endpoints(focal.id, candidate.item.id);
            graph.push_edge(LocalEdge {
                id: format!("{}-{}-{}-{}", candidate.relationship, source, target, position),
                source: source.to_string(),
                target: target.to_string(),
                relationship: candidate.relationship,
                shared_terms: candidate.shared_terms,
            });
        }

        log::debug!(
            "Built local graph for item {}: {} nodes, {} edges",
            focal.id,
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    async fn connected_items(&self, focal: &ContentItem, max_edges: usize) -> Result<Vec<Candidate>> {
        let mut connected = Vec::new();

        if let Some(parent_id) = focal.parent_id {
            if let Some(parent) = self.repo.get_item(parent_id).await? {
                connected.push(Candidate::outgoing(parent, Relationship::Parent));
            }
        }

        for child in self.repo.list_children(focal.id, &focal.kind).await? {
            connected.push(Candidate::outgoing(child, Relationship::Child));
        }
        // Later passes can only append past the cap.
        if connected.len() >= max_edges {
            connected.truncate(max_edges);
            return Ok(connected);
        }

        let links = LinkExtractor::new(self.repo);
        for target in links.resolve_targets(focal.id, &focal.body).await? {
            if let Some(linked) = self.repo.get_item(target).await? {
                connected.push(Candidate::outgoing(linked, Relationship::InternalLink));
            }
        }
        if connected.len() >= max_edges {
            connected.truncate(max_edges);
            return Ok(connected);
        }

        // Text heuristic: any body quoting the focal permalink counts as a link.
        let permalink = self.repo.permalink(focal);
        let incoming = ItemQuery::new(self.options.incoming_limit)
            .excluding(focal.id)
            .body_contains(permalink.clone());
        for linking in self.repo.search_items(&incoming).await? {
            if linking.body.contains(&permalink) {
                connected.push(Candidate {
                    item: linking,
                    relationship: Relationship::InternalLink,
                    direction: Direction::Incoming,
                    shared_terms: None,
                });
            }
        }
        if connected.len() >= max_edges {
            connected.truncate(max_edges);
            return Ok(connected);
        }

        let mut indexer = TaxonomyIndexer::new(self.repo);
        let term_ids = indexer.term_ids_of(focal).await?;
        if !term_ids.is_empty() {
            let related = ItemQuery::new(self.options.related_limit)
                .kind(&focal.kind)
                .excluding(focal.id)
                .with_any_term(term_ids);
            for item in self.repo.search_items(&related).await? {
                let shared_terms = indexer.shared_taxonomy_of(focal, &item).await?;
                connected.push(Candidate {
                    item,
                    relationship: Relationship::SharedTaxonomy,
                    direction: Direction::Outgoing,
                    shared_terms,
                });
            }
        }

        connected.truncate(max_edges);
        Ok(connected)
    }
}
