//! CREATE and DROP statements for tables and sequences.

use crate::dialect::Dialect;
use crate::engine::Engine;
use crate::error::Result;
use crate::schema::Table;

/// `CREATE TABLE` for `table`.
#[must_use]
pub fn create_table_sql(table: &Table, dialect: &dyn Dialect) -> String {
    let mut parts: Vec<String> = table
        .column_defs()
        .iter()
        .map(|def| {
            let mut col = format!("{} {}", def.name, dialect.render_type(&def.ty));
            if !def.nullable {
                col.push_str(" NOT NULL");
            }
            col
        })
        .collect();

    let pk: Vec<&str> = table
        .column_defs()
        .iter()
        .filter(|def| def.primary_key)
        .map(|def| def.name.as_str())
        .collect();
    if !pk.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }

    for fk in table.foreign_keys() {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            fk.column, fk.ref_table, fk.ref_column
        ));
    }

    format!("CREATE TABLE {} ({})", table.fullname(), parts.join(", "))
}

/// `DROP TABLE` for `table`.
#[must_use]
pub fn drop_table_sql(table: &Table) -> String {
    format!("DROP TABLE {}", table.fullname())
}

impl Table {
    /// Creates the table, and its sequences where the dialect has them.
    ///
    /// # Errors
    ///
    /// Returns the engine's error when a statement fails.
    pub fn create(&self, engine: &mut dyn Engine) -> Result<()> {
        if engine.dialect().supports_sequences() {
            for def in self.column_defs() {
                if let Some(seq) = def.sequence.as_ref().filter(|s| !s.optional) {
                    let sql = format!(
                        "CREATE SEQUENCE {} START WITH {} INCREMENT BY {}",
                        seq.name, seq.start, seq.increment
                    );
                    engine.execute(&sql, &[])?;
                }
            }
        }
        let sql = create_table_sql(self, engine.dialect());
        tracing::info!(table = %self.fullname(), "Creating table");
        tracing::debug!(sql = %sql, "Executing DDL");
        engine.execute(&sql, &[])?;
        Ok(())
    }

    /// Drops the table, and its sequences where the dialect has them.
    ///
    /// # Errors
    ///
    /// Returns the engine's error when a statement fails.
    pub fn drop_table(&self, engine: &mut dyn Engine) -> Result<()> {
        tracing::info!(table = %self.fullname(), "Dropping table");
        engine.execute(&drop_table_sql(self), &[])?;
        if engine.dialect().supports_sequences() {
            for def in self.column_defs() {
                if let Some(seq) = def.sequence.as_ref().filter(|s| !s.optional) {
                    engine.execute(&format!("DROP SEQUENCE {}", seq.name), &[])?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::GenericDialect;
    use crate::schema::ColumnDef;
    use crate::types::SqlType;

    #[test]
    fn test_create_table_sql() {
        let t = Table::new(
            "addresses",
            vec![
                ColumnDef::new("address_id", SqlType::Integer).primary_key(),
                ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
                ColumnDef::new("email_address", SqlType::varchar(40)).not_null(),
            ],
        );
        assert_eq!(
            create_table_sql(&t, &GenericDialect::new()),
            "CREATE TABLE addresses (address_id INTEGER NOT NULL, user_id INTEGER, \
             email_address VARCHAR(40) NOT NULL, PRIMARY KEY (address_id), \
             FOREIGN KEY (user_id) REFERENCES users (user_id))"
        );
    }
}
