use clausemap_core::{ColumnRef, SqlValue};

use crate::instance::Instance;
use crate::loading::{Row, TableAdapter};

/// A scalar attribute backed by one or more columns.
///
/// Several columns appear when joined tables share an attribute, such as
/// the primary key of an inheriting table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnProperty {
    columns: Vec<ColumnRef>,
}

impl ColumnProperty {
    /// A property over `columns`.
    #[must_use]
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self { columns }
    }

    /// Backing columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub(crate) fn push(&mut self, column: ColumnRef) {
        if !self.columns.iter().any(|c| c.same_origin(&column)) {
            self.columns.push(column);
        }
    }

    pub(crate) fn execute(&self, key: &str, instance: &Instance, row: &Row<'_>, adapter: &TableAdapter) {
        let value = self
            .columns
            .iter()
            .find_map(|column| row.get(&adapter.column(column)))
            .unwrap_or(SqlValue::Null);
        instance.set_committed(key, value);
    }
}
