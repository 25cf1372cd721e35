//! The database engine seam.
//!
//! An [`Engine`] executes SQL text with positional parameters and reports
//! rows, affected-row counts and generated keys. Drivers live in their own
//! crates.

use crate::clause::ClauseNode;
use crate::compiler::compile;
use crate::dialect::Dialect;
use crate::error::{EngineError, Result};
use crate::schema::{Sequence, Table};
use crate::value::{Params, SqlValue};

/// Rows returned by a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names as reported by the driver.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<SqlValue>>,
    /// Rows changed by an INSERT, UPDATE or DELETE.
    pub rows_affected: u64,
}

impl ResultSet {
    /// Position of the named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `(row, column name)`.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }
}

/// A connection able to run compiled SQL.
pub trait Engine {
    /// The dialect statements must be compiled for.
    fn dialect(&self) -> &dyn Dialect;

    /// Executes `sql` with positional `params`.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> std::result::Result<ResultSet, EngineError>;

    /// Primary key values generated by the last INSERT into `table`, in
    /// primary key column order.
    fn last_inserted_ids(&self, table: &Table) -> Option<Vec<SqlValue>> {
        let _ = table;
        None
    }

    /// Next value of `sequence`, for dialects that pre-execute sequences.
    fn next_sequence_value(
        &mut self,
        sequence: &Sequence,
    ) -> std::result::Result<Option<SqlValue>, EngineError> {
        let _ = sequence;
        Ok(None)
    }

    /// Starts a transaction.
    fn begin(&mut self) -> std::result::Result<(), EngineError> {
        Ok(())
    }

    /// Commits the current transaction.
    fn commit(&mut self) -> std::result::Result<(), EngineError> {
        Ok(())
    }

    /// Rolls back the current transaction.
    fn rollback(&mut self) -> std::result::Result<(), EngineError> {
        Ok(())
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn dialect(&self) -> &dyn Dialect {
        (**self).dialect()
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> std::result::Result<ResultSet, EngineError> {
        (**self).execute(sql, params)
    }

    fn last_inserted_ids(&self, table: &Table) -> Option<Vec<SqlValue>> {
        (**self).last_inserted_ids(table)
    }

    fn next_sequence_value(
        &mut self,
        sequence: &Sequence,
    ) -> std::result::Result<Option<SqlValue>, EngineError> {
        (**self).next_sequence_value(sequence)
    }

    fn begin(&mut self) -> std::result::Result<(), EngineError> {
        (**self).begin()
    }

    fn commit(&mut self) -> std::result::Result<(), EngineError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> std::result::Result<(), EngineError> {
        (**self).rollback()
    }
}

/// Compiles `node` for the engine's dialect and executes it with `params`.
///
/// # Errors
///
/// Fails when `node` does not compile or the engine rejects it.
pub fn execute(engine: &mut dyn Engine, node: &ClauseNode, params: &Params) -> Result<ResultSet> {
    let compiled = compile(node, engine.dialect(), Some(params))?;
    let values = compiled.params_for(engine.dialect(), params);
    tracing::debug!(sql = %compiled.sql(), params = ?values, "Executing SQL");
    Ok(engine.execute(compiled.sql(), &values)?)
}
