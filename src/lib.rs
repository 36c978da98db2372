pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod graph;
pub mod http;

pub use config::Config;
pub use error::{GraphviewError, Result};
pub use graph::{BuildOptions, FullGraph, GraphBuilder, LocalGraph};
