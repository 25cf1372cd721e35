//! Table and column metadata.
//!
//! A [`Table`] is a cheap, shareable handle over an immutable definition.
//! Columns are handed out as [`ColumnRef`] clause elements that remember
//! which selectable they belong to and which physical column they stand for.

mod reflect;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use reflect::{ReflectedColumn, TableReflection};

use crate::clause::{Alias, ClauseNode, Delete, Insert, Join, Select, Update};
use crate::error::{CompileError, Result};
use crate::types::SqlType;

/// A database sequence used to generate primary key values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    /// Sequence name.
    pub name: String,
    /// First value.
    pub start: i64,
    /// Step between values.
    pub increment: i64,
    /// Only used on dialects without native autoincrement.
    pub optional: bool,
}

impl Sequence {
    /// Creates a sequence starting at 1.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 1,
            increment: 1,
            optional: false,
        }
    }

    /// Marks the sequence as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A foreign key constraint from one local column to a column on another table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Local column name.
    pub column: String,
    /// Referenced table name.
    pub ref_table: String,
    /// Referenced column name.
    pub ref_column: String,
}

/// Column definition used to build a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: SqlType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
    /// Referenced `(table, column)`, if any.
    pub references: Option<(String, String)>,
    /// Key generator, if any.
    pub sequence: Option<Sequence>,
}

impl ColumnDef {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            primary_key: false,
            references: None,
            sequence: None,
        }
    }

    /// Makes the column part of the primary key (implies NOT NULL).
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Adds a foreign key to `"table.column"`.
    #[must_use]
    pub fn references(mut self, target: &str) -> Self {
        let (table, column) = match target.rsplit_once('.') {
            Some((t, c)) => (t.to_string(), c.to_string()),
            None => (target.to_string(), self.name.clone()),
        };
        self.references = Some((table, column));
        self
    }

    /// Attaches a sequence.
    #[must_use]
    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

#[derive(Debug)]
struct TableDef {
    name: String,
    schema: Option<String>,
    columns: Vec<ColumnDef>,
}

/// A table: a named, schema-qualified list of typed columns.
///
/// Cloning is cheap. Two handles are equal when they name the same table.
#[derive(Clone)]
pub struct Table(Arc<TableDef>);

impl Table {
    /// Creates a table in the default schema.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self(Arc::new(TableDef {
            name: name.into(),
            schema: None,
            columns,
        }))
    }

    /// Creates a table in a named schema.
    #[must_use]
    pub fn with_schema(
        name: impl Into<String>,
        schema: impl Into<String>,
        columns: Vec<ColumnDef>,
    ) -> Self {
        Self(Arc::new(TableDef {
            name: name.into(),
            schema: Some(schema.into()),
            columns,
        }))
    }

    /// Table name without schema.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Schema name, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.0.schema.as_deref()
    }

    /// Schema-qualified name as rendered in SQL.
    #[must_use]
    pub fn fullname(&self) -> String {
        match &self.0.schema {
            Some(schema) => format!("{schema}.{}", self.0.name),
            None => self.0.name.clone(),
        }
    }

    /// Raw column definitions.
    #[must_use]
    pub fn column_defs(&self) -> &[ColumnDef] {
        &self.0.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<ColumnRef> {
        self.0
            .columns
            .iter()
            .find(|def| def.name == name)
            .map(|def| self.column_ref(def))
    }

    /// Looks up a column by name, failing with a compile error.
    ///
    /// # Errors
    ///
    /// Fails when the table has no column `name`.
    pub fn try_c(&self, name: &str) -> Result<ColumnRef> {
        self.column(name).ok_or_else(|| CompileError::UnknownColumn {
            table: self.fullname(),
            column: name.to_string(),
        })
    }

    /// Returns the named column.
    ///
    /// # Panics
    ///
    /// Panics if the table has no such column.
    #[must_use]
    pub fn c(&self, name: &str) -> ColumnRef {
        match self.column(name) {
            Some(column) => column,
            None => panic!("table '{}' has no column '{name}'", self.fullname()),
        }
    }

    /// All columns in definition order.
    #[must_use]
    pub fn columns(&self) -> Vec<ColumnRef> {
        self.0.columns.iter().map(|def| self.column_ref(def)).collect()
    }

    /// Primary key columns in definition order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<ColumnRef> {
        self.0
            .columns
            .iter()
            .filter(|def| def.primary_key)
            .map(|def| self.column_ref(def))
            .collect()
    }

    /// Foreign keys declared on this table's columns.
    #[must_use]
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        self.0
            .columns
            .iter()
            .filter_map(|def| {
                def.references.as_ref().map(|(table, column)| ForeignKey {
                    column: def.name.clone(),
                    ref_table: table.clone(),
                    ref_column: column.clone(),
                })
            })
            .collect()
    }

    /// `SELECT` of every column of this table.
    #[must_use]
    pub fn select(&self) -> Select {
        crate::clause::select([self.clone()])
    }

    /// `INSERT` into this table.
    #[must_use]
    pub fn insert(&self) -> Insert {
        Insert::new(self.clone())
    }

    /// `UPDATE` of this table.
    #[must_use]
    pub fn update(&self) -> Update {
        Update::new(self.clone())
    }

    /// `DELETE` from this table.
    #[must_use]
    pub fn delete(&self) -> Delete {
        Delete::new(self.clone())
    }

    /// Aliases this table under `name`.
    #[must_use]
    pub fn alias(&self, name: impl Into<String>) -> Alias {
        Alias::new(self.clone(), name)
    }

    /// Inner join with the condition inferred from foreign keys.
    ///
    /// # Errors
    ///
    /// Fails when no foreign key joins the two sides.
    pub fn join(&self, right: impl Into<ClauseNode>) -> Result<Join> {
        Join::infer(self.clone(), right, false)
    }

    /// Left outer join with the condition inferred from foreign keys.
    ///
    /// # Errors
    ///
    /// Fails when no foreign key joins the two sides.
    pub fn outerjoin(&self, right: impl Into<ClauseNode>) -> Result<Join> {
        Join::infer(self.clone(), right, true)
    }

    fn column_ref(&self, def: &ColumnDef) -> ColumnRef {
        ColumnRef {
            owner: ColumnOwner::Table(self.clone()),
            name: def.name.clone(),
            ty: def.ty,
            primary_key: def.primary_key,
            origin: ColumnIdent::new(self.fullname(), def.name.clone()),
        }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.name == other.0.name && self.0.schema == other.0.schema)
    }
}

impl Eq for Table {}

impl Hash for Table {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.schema.hash(state);
        self.0.name.hash(state);
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.fullname())
    }
}

/// Identifies a physical column as `(table fullname, column name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnIdent {
    /// Table fullname; empty for free-standing columns.
    pub table: String,
    /// Column name.
    pub column: String,
}

impl ColumnIdent {
    /// Creates an identifier.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_empty() {
            f.write_str(&self.column)
        } else {
            write!(f, "{}.{}", self.table, self.column)
        }
    }
}

/// The selectable a column reference belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnOwner {
    /// A base table.
    Table(Table),
    /// A proxy on an alias.
    Alias(Alias),
    /// A free-standing column with no table.
    Anonymous,
}

/// A column as a clause element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    owner: ColumnOwner,
    name: String,
    ty: SqlType,
    primary_key: bool,
    origin: ColumnIdent,
}

impl ColumnRef {
    /// A free-standing column rendered by its bare name.
    #[must_use]
    pub fn anonymous(name: impl Into<String>, ty: SqlType) -> Self {
        let name = name.into();
        Self {
            owner: ColumnOwner::Anonymous,
            origin: ColumnIdent::new("", name.clone()),
            name,
            ty,
            primary_key: false,
        }
    }

    pub(crate) fn proxy(source: &Self, alias: &Alias, name: String) -> Self {
        Self {
            owner: ColumnOwner::Alias(alias.clone()),
            name,
            ty: source.ty,
            primary_key: source.primary_key,
            origin: source.origin.clone(),
        }
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type.
    #[must_use]
    pub const fn ty(&self) -> SqlType {
        self.ty
    }

    /// Whether the column is part of its table's primary key.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// The selectable that owns this column.
    #[must_use]
    pub const fn owner(&self) -> &ColumnOwner {
        &self.owner
    }

    /// The owning table, when the owner is a base table.
    #[must_use]
    pub const fn table(&self) -> Option<&Table> {
        match &self.owner {
            ColumnOwner::Table(t) => Some(t),
            _ => None,
        }
    }

    /// The physical column this reference ultimately stands for.
    #[must_use]
    pub const fn origin(&self) -> &ColumnIdent {
        &self.origin
    }

    /// Name of the owner as it appears in SQL, if any.
    #[must_use]
    pub fn owner_name(&self) -> Option<String> {
        match &self.owner {
            ColumnOwner::Table(t) => Some(t.fullname()),
            ColumnOwner::Alias(a) => Some(a.name().to_string()),
            ColumnOwner::Anonymous => None,
        }
    }

    /// `owner.column`, or the bare name for free-standing columns.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match self.owner_name() {
            Some(owner) => format!("{owner}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Default result label and bind name: `owner_column`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.owner {
            ColumnOwner::Table(t) => format!("{}_{}", t.name(), self.name),
            ColumnOwner::Alias(a) => format!("{}_{}", a.name(), self.name),
            ColumnOwner::Anonymous => self.name.clone(),
        }
    }

    /// Whether both references stand for the same physical column.
    #[must_use]
    pub fn same_origin(&self, other: &Self) -> bool {
        self.origin == other.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new(
            "users",
            vec![
                ColumnDef::new("user_id", SqlType::Integer).primary_key(),
                ColumnDef::new("user_name", SqlType::varchar(40)).not_null(),
            ],
        )
    }

    #[test]
    fn test_table_columns_and_primary_key() {
        let t = users();
        assert_eq!(t.columns().len(), 2);
        let pk = t.primary_key();
        assert_eq!(pk.len(), 1);
        assert_eq!(pk[0].name(), "user_id");
        assert!(t.column("missing").is_none());
        assert!(t.try_c("missing").is_err());
    }

    #[test]
    fn test_foreign_key_parsing() {
        let t = Table::new(
            "addresses",
            vec![
                ColumnDef::new("address_id", SqlType::Integer).primary_key(),
                ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
            ],
        );
        assert_eq!(
            t.foreign_keys(),
            vec![ForeignKey {
                column: "user_id".into(),
                ref_table: "users".into(),
                ref_column: "user_id".into(),
            }]
        );
    }

    #[test]
    fn test_column_label_and_qualified_name() {
        let t = users();
        let c = t.c("user_name");
        assert_eq!(c.label(), "users_user_name");
        assert_eq!(c.qualified_name(), "users.user_name");
        assert_eq!(c.origin().to_string(), "users.user_name");
    }

    #[test]
    fn test_schema_qualified_fullname() {
        let t = Table::with_schema("users", "main", vec![]);
        assert_eq!(t.fullname(), "main.users");
    }

    #[test]
    fn test_tables_equal_by_name() {
        assert_eq!(users(), users());
        assert_eq!(users().c("user_id"), users().c("user_id"));
    }
}
