//! Loading table definitions from a live database.

use super::{ColumnDef, ForeignKey, Table};
use crate::error::EngineError;
use crate::types::SqlType;

/// A column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedColumn {
    /// Column name.
    pub name: String,
    /// Column type, mapped back from the declared type.
    pub ty: SqlType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

/// Source of table metadata, typically an engine.
pub trait TableReflection {
    /// Returns the columns and foreign keys of `table`.
    fn reflect_table(
        &mut self,
        table: &str,
    ) -> Result<(Vec<ReflectedColumn>, Vec<ForeignKey>), EngineError>;
}

impl Table {
    /// Builds a table from catalog metadata.
    ///
    /// # Errors
    ///
    /// Returns the source's error when the catalog cannot be read.
    pub fn reflect(name: &str, source: &mut dyn TableReflection) -> Result<Self, EngineError> {
        let (columns, foreign_keys) = source.reflect_table(name)?;
        if columns.is_empty() {
            return Err(EngineError::Message(format!("no such table: {name}")));
        }
        let defs = columns
            .into_iter()
            .map(|col| {
                let mut def = ColumnDef::new(col.name, col.ty);
                def.nullable = col.nullable && !col.primary_key;
                def.primary_key = col.primary_key;
                if let Some(fk) = foreign_keys.iter().find(|fk| fk.column == def.name) {
                    def.references = Some((fk.ref_table.clone(), fk.ref_column.clone()));
                }
                def
            })
            .collect();
        tracing::debug!(table = %name, "Reflected table");
        Ok(Self::new(name, defs))
    }
}
