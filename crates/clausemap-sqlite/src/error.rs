//! Error types for the SQLite engine.

use clausemap_core::EngineError;
use thiserror::Error;

/// Errors raised while talking to SQLite.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The blocking runtime could not be started.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<SqliteError> for EngineError {
    fn from(err: SqliteError) -> Self {
        Self::driver(err)
    }
}

/// Result type for SQLite operations.
pub type Result<T> = std::result::Result<T, SqliteError>;
