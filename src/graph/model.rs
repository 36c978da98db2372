//! Node/edge shapes handed to the renderer.
//!
//! Every element is wrapped as `{ "data": { ... } }`, the layout graph
//! renderers consume directly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::content::ItemId;

/// Kind of relationship an edge states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Parent,
    Child,
    InternalLink,
    SharedTaxonomy,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::InternalLink => "internal_link",
            Self::SharedTaxonomy => "shared_taxonomy",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a local-graph edge points relative to the focal item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// focal → candidate
    Outgoing,
    /// candidate → focal
    Incoming,
}

impl Direction {
    /// `(source, target)` for an edge between `focal` and `other`.
    pub fn endpoints(self, focal: ItemId, other: ItemId) -> (ItemId, ItemId) {
        match self {
            Self::Outgoing => (focal, other),
            Self::Incoming => (other, focal),
        }
    }
}

/// A taxonomy label with term names, used both for node enrichment and for
/// the `shared_terms` of shared-taxonomy edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTerms {
    pub taxonomy: String,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element<T> {
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph<N, E> {
    pub nodes: Vec<Element<N>>,
    pub edges: Vec<Element<E>>,
}

impl<N, E> Default for Graph<N, E> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<N, E> Graph<N, E> {
    pub fn push_node(&mut self, node: N) {
        self.nodes.push(Element { data: node });
    }

    pub fn push_edge(&mut self, edge: E) {
        self.edges.push(Element { data: edge });
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter().map(|n| &n.data)
    }

    pub fn edges(&self) -> impl Iterator<Item = &E> {
        self.edges.iter().map(|e| &e.data)
    }
}

/// Whole-corpus graph.
pub type FullGraph = Graph<FullNode, FullEdge>;

/// Neighbourhood of one focal item.
pub type LocalGraph = Graph<LocalNode, LocalEdge>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub excerpt: String,
    pub taxonomies: Vec<TaxonomyTerms>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relationship: Relationship,
    pub source_title: String,
    pub target_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_terms: Option<TaxonomyTerms>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "isCurrent")]
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relationship: Relationship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_terms: Option<TaxonomyTerms>,
}
