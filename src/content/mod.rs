//! Content store access: item and taxonomy types, the repository trait the
//! graph builder reads through, and its SQLite and in-memory implementations.

mod corpus;
mod excerpt;
mod memory;
mod permalink;
mod sqlite;

pub use corpus::{Assignment, Corpus, TaxonomyDef, TermDef};
pub use excerpt::trim_words;
pub use memory::InMemoryContentRepository;
pub use permalink::{Permalinks, UrlTarget};
pub use sqlite::{ImportStats, SqliteContentRepository};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;

/// Stable identifier of a content item.
pub type ItemId = i64;

/// Identifier of a taxonomy term.
pub type TermId = i64;

/// A single unit of content (article, page, or custom kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    #[serde(default)]
    pub title: String,
    /// Type tag, e.g. `post`, `page` or a custom kind.
    pub kind: String,
    /// URL slug used to build the item's permalink.
    pub slug: String,
    /// Raw body text, may embed anchor tags.
    #[serde(default)]
    pub body: String,
    /// Stored summary; may be blank, in which case the body is summarised.
    #[serde(default)]
    pub excerpt: String,
    /// Parent pointer. Not guaranteed to resolve, not guaranteed acyclic.
    #[serde(default)]
    pub parent_id: Option<ItemId>,
}

/// A classification system registered for one or more kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    /// Machine name, e.g. `category`.
    pub name: String,
    /// Singular display label, e.g. `Category`. Missing labels are tolerated.
    pub label: Option<String>,
}

/// A term within a taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub name: String,
}

/// Which kinds a search may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindFilter {
    Any,
    Only(Vec<String>),
}

impl KindFilter {
    pub fn accepts(&self, kind: &str) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Only(kinds) => kinds.iter().any(|k| k == kind),
        }
    }
}

/// Capped item search used by the local graph's incoming-link and
/// shared-taxonomy passes.
#[derive(Debug, Clone)]
pub struct ItemQuery {
    pub kinds: KindFilter,
    pub exclude: Vec<ItemId>,
    /// Literal substring the body must contain.
    pub body_contains: Option<String>,
    /// Item must carry at least one of these terms (ignored when empty).
    pub term_ids: Vec<TermId>,
    pub limit: usize,
}

impl ItemQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            kinds: KindFilter::Any,
            exclude: Vec::new(),
            body_contains: None,
            term_ids: Vec::new(),
            limit,
        }
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kinds = KindFilter::Only(vec![kind.to_string()]);
        self
    }

    pub fn excluding(mut self, id: ItemId) -> Self {
        self.exclude.push(id);
        self
    }

    pub fn body_contains(mut self, needle: impl Into<String>) -> Self {
        self.body_contains = Some(needle.into());
        self
    }

    pub fn with_any_term(mut self, term_ids: impl IntoIterator<Item = TermId>) -> Self {
        self.term_ids.extend(term_ids);
        self
    }

    /// Whether `item`, carrying `item_terms`, satisfies every filter except the limit.
    pub fn matches(&self, item: &ContentItem, item_terms: &HashSet<TermId>) -> bool {
        if !self.kinds.accepts(&item.kind) || self.exclude.contains(&item.id) {
            return false;
        }
        if let Some(needle) = &self.body_contains {
            if !item.body.contains(needle.as_str()) {
                return false;
            }
        }
        self.term_ids.is_empty() || self.term_ids.iter().any(|t| item_terms.contains(t))
    }
}

/// Read-only view of the content store.
///
/// Listing operations return items in a stable fetch order (ascending id for
/// the bundled implementations); the full graph's pair ordering depends on it.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// All items of the given kinds, unbounded.
    async fn list_items(&self, kinds: &[String]) -> Result<Vec<ContentItem>>;

    async fn get_item(&self, id: ItemId) -> Result<Option<ContentItem>>;

    /// Items of `kind` whose parent pointer is `parent_id`.
    async fn list_children(&self, parent_id: ItemId, kind: &str) -> Result<Vec<ContentItem>>;

    /// Resolve an href to an item id. External or unknown URLs yield `None`.
    async fn resolve_url(&self, url: &str) -> Result<Option<ItemId>>;

    /// Canonical URL of an item.
    fn permalink(&self, item: &ContentItem) -> String;

    /// Taxonomies registered for `kind`, in registration order.
    async fn taxonomies_for_kind(&self, kind: &str) -> Result<Vec<Taxonomy>>;

    /// Terms assigned to an item within one taxonomy.
    async fn item_terms(&self, item_id: ItemId, taxonomy: &str) -> Result<Vec<Term>>;

    async fn search_items(&self, query: &ItemQuery) -> Result<Vec<ContentItem>>;
}
