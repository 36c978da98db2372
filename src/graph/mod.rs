//! Content graph: relationship discovery over a content repository and the
//! node/edge model handed to renderers.
//!
//! Two builds are offered. [`GraphBuilder::build_full`] covers every item of
//! the configured kinds; [`GraphBuilder::build_local`] covers one focal item
//! and its capped neighbourhood.

mod builder;
mod links;
mod model;
mod pairs;
mod taxonomy;

pub use builder::{BuildOptions, GraphBuilder};
pub use links::{extract_hrefs, LinkExtractor};
pub use model::{
    Direction, Element, FullEdge, FullGraph, FullNode, Graph, LocalEdge, LocalGraph, LocalNode,
    Relationship, TaxonomyTerms,
};
pub use pairs::{InvertedIndex, PairStrategy, PairStrategyKind, PairwiseScan};
pub use taxonomy::TaxonomyIndexer;
