use thiserror::Error;

use crate::content::ItemId;

/// Main error type for GraphView
#[derive(Error, Debug)]
pub enum GraphviewError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Focal content item does not exist
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// Content store unreachable or failing
    #[error("Content store error: {0}")]
    ContentStore(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),
}

impl GraphviewError {
    /// Machine-readable kind reported to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphviewError::ItemNotFound(_) => "not_found",
            GraphviewError::InvalidInput(_) => "invalid_input",
            _ => "graph_error",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GraphviewError::ItemNotFound(_) => 404,
            GraphviewError::InvalidInput(_) => 400,
            _ => 500,
        }
    }
}

/// Convenient Result type using GraphviewError
pub type Result<T> = std::result::Result<T, GraphviewError>;
