//! Error types for clause construction, compilation and execution.

use thiserror::Error;

/// Errors raised by a database engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The driver reported an error.
    #[error("Driver error: {0}")]
    Driver(Box<dyn std::error::Error + Send + Sync>),
    /// The engine was used in a way it does not support.
    #[error("Engine error: {0}")]
    Message(String),
}

impl EngineError {
    /// Wraps any driver error.
    pub fn driver<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver(Box::new(err))
    }
}

/// Errors raised while building or compiling a clause tree.
#[derive(Debug, Error)]
pub enum CompileError {
    /// `NULL` was compared with an operator other than equality.
    #[error("Only '=' and '!=' style null checks are supported; got '{operator}' against NULL")]
    NullComparison {
        /// The rejected operator.
        operator: String,
    },

    /// No foreign key links the two sides of a join.
    #[error("Cannot determine join condition between '{left}' and '{right}'")]
    NoJoinCondition {
        /// Left side identifier.
        left: String,
        /// Right side identifier.
        right: String,
    },

    /// A top-level SELECT has nothing to select from.
    #[error("Statement has no FROM clause and none can be derived from its columns")]
    NoFromClause,

    /// A named column does not exist on the table.
    #[error("Table '{table}' has no column '{column}'")]
    UnknownColumn {
        /// The table.
        table: String,
        /// The missing column.
        column: String,
    },

    /// Execution failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for clause operations.
pub type Result<T> = std::result::Result<T, CompileError>;
