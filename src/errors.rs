//! Error types for extraction planning.

use thiserror::Error;

/// Unified error type for cogsaw operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Source text could not be parsed into a method tree
    #[error("parse error: {0}")]
    Parse(String),

    /// The source model rejected an operation outright
    #[error("source model error: {0}")]
    SourceModel(String),

    /// A chosen extraction turned out to be infeasible at apply time
    #[error("extraction of [{start}, {end}) is infeasible: {reason}")]
    Infeasible {
        start: u32,
        end: u32,
        reason: String,
    },

    /// An edit in a chosen solution could not be applied. Everything applied
    /// before it has been rolled back.
    #[error("apply failure at extraction {index}: {message}")]
    Apply { index: usize, message: String },

    /// Malformed cache row, offsets outside the tree, or a containment graph
    /// with more than one sink. Aborts planning for the current method only.
    #[error("model error: {0}")]
    Model(String),

    /// Configuration file or value errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Cache import/export errors
    #[error("cache error: {0}")]
    Cache(String),

    /// LP solver errors
    #[error("solver error: {0}")]
    Solver(String),

    /// File system I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn source_model(message: impl Into<String>) -> Self {
        Self::SourceModel(message.into())
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn context(self, msg: &str) -> Result<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| Error::Model(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::Model(format!("{}: {}", f(), e)))
    }
}
