//! Error types for the ORM.

use clausemap_core::{CompileError, EngineError};
use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A mapper or relation is configured in a way that cannot work.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Statement construction or compilation failed.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// An UPDATE or DELETE touched a different number of rows than expected.
    #[error("concurrency error: expected {expected} row(s) in '{table}', matched {actual}")]
    Concurrency {
        /// The table written to.
        table: String,
        /// Rows the flush meant to change.
        expected: u64,
        /// Rows the database reported.
        actual: u64,
    },

    /// Database error from the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// No primary mapper exists for the class.
    #[error("no mapper registered for class '{0}'")]
    NoMapper(String),

    /// The class has no property with this name.
    #[error("class '{class}' has no property '{key}'")]
    UnknownProperty {
        /// Mapped class.
        class: String,
        /// Requested property.
        key: String,
    },

    /// Invalid JSON configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

impl OrmError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
