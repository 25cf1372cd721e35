//! INSERT, UPDATE and DELETE statements.
//!
//! Column values may be given on the statement and again at compile time.
//! Compile-time parameters win; with neither, every column of the table is
//! bound by name.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::elements::BindParam;
use super::operators::{IntoOperand, Operand};
use super::{ClauseNode, Compound, CompoundOp};
use crate::schema::{ColumnRef, Table};
use crate::value::Params;

type ColumnParams = Vec<(String, ClauseNode)>;

fn bind_for(column: &ColumnRef, operand: Operand) -> ClauseNode {
    match operand {
        Operand::Value(value) => ClauseNode::BindParam(
            BindParam::new(column.name())
                .with_value(value)
                .with_type(column.ty()),
        ),
        Operand::Clause(node) => node,
    }
}

fn correlate_to(table: &Table, node: &mut ClauseNode) {
    let id = table.fullname();
    node.walk_selects_mut(&mut |nested| {
        nested.is_where = true;
        nested
            .correlated
            .get_or_insert_with(BTreeSet::new)
            .insert(id.clone());
    });
}

fn collect_values<I, K, V>(table: &Table, params: &mut Option<ColumnParams>, values: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: IntoOperand,
{
    let target = params.get_or_insert_with(Vec::new);
    for (key, value) in values {
        let key = key.into();
        let Some(column) = table.column(&key) else {
            tracing::warn!(table = %table.fullname(), column = %key, "Ignoring value for unknown column");
            continue;
        };
        let mut node = bind_for(&column, value.into_operand());
        correlate_to(table, &mut node);
        target.retain(|(existing, _)| *existing != key);
        target.push((key, node));
    }
}

// Call-time parameters first, then statement parameters, then every column.
fn column_params(
    table: &Table,
    stmt: Option<&ColumnParams>,
    overrides: Option<&Params>,
) -> Vec<(ColumnRef, ClauseNode)> {
    let columns = table.columns();
    if stmt.is_none() && overrides.is_none() {
        return columns
            .into_iter()
            .map(|c| {
                let node = bind_for(&c, Operand::Value(crate::SqlValue::Null));
                (c, node)
            })
            .collect();
    }

    let mut merged: IndexMap<String, ClauseNode> = IndexMap::new();
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            if let Some(column) = table.column(key) {
                merged.insert(key.clone(), bind_for(&column, Operand::Value(value.clone())));
            }
        }
    }
    if let Some(stmt) = stmt {
        for (key, node) in stmt {
            merged.entry(key.clone()).or_insert_with(|| node.clone());
        }
    }

    columns
        .into_iter()
        .filter_map(|c| merged.get(c.name()).cloned().map(|node| (c, node)))
        .collect()
}

/// An INSERT statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Insert {
    pub(crate) table: Table,
    pub(crate) parameters: Option<ColumnParams>,
}

impl Insert {
    /// INSERT into `table`.
    #[must_use]
    pub const fn new(table: Table) -> Self {
        Self {
            table,
            parameters: None,
        }
    }

    /// Sets column values; literals become binds named after the column.
    #[must_use]
    pub fn values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoOperand,
    {
        collect_values(&self.table, &mut self.parameters, values);
        self
    }

    /// Target table.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// Columns and value expressions to render, after merging `overrides`.
    #[must_use]
    pub fn column_params(&self, overrides: Option<&Params>) -> Vec<(ColumnRef, ClauseNode)> {
        column_params(&self.table, self.parameters.as_ref(), overrides)
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Update {
    pub(crate) table: Table,
    pub(crate) where_clause: Option<ClauseNode>,
    pub(crate) parameters: Option<ColumnParams>,
}

impl Update {
    /// UPDATE of `table`.
    #[must_use]
    pub const fn new(table: Table) -> Self {
        Self {
            table,
            where_clause: None,
            parameters: None,
        }
    }

    /// ANDs a criterion into the WHERE clause.
    #[must_use]
    pub fn where_(mut self, clause: impl Into<ClauseNode>) -> Self {
        self.where_clause = Some(and_where(&self.table, self.where_clause.take(), clause.into()));
        self
    }

    /// Sets column values; literals become binds named after the column.
    #[must_use]
    pub fn values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoOperand,
    {
        collect_values(&self.table, &mut self.parameters, values);
        self
    }

    /// Target table.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// The WHERE clause.
    #[must_use]
    pub const fn where_clause(&self) -> Option<&ClauseNode> {
        self.where_clause.as_ref()
    }

    /// Columns and value expressions to render, after merging `overrides`.
    #[must_use]
    pub fn column_params(&self, overrides: Option<&Params>) -> Vec<(ColumnRef, ClauseNode)> {
        column_params(&self.table, self.parameters.as_ref(), overrides)
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delete {
    pub(crate) table: Table,
    pub(crate) where_clause: Option<ClauseNode>,
}

impl Delete {
    /// DELETE from `table`.
    #[must_use]
    pub const fn new(table: Table) -> Self {
        Self {
            table,
            where_clause: None,
        }
    }

    /// ANDs a criterion into the WHERE clause.
    #[must_use]
    pub fn where_(mut self, clause: impl Into<ClauseNode>) -> Self {
        self.where_clause = Some(and_where(&self.table, self.where_clause.take(), clause.into()));
        self
    }

    /// Target table.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// The WHERE clause.
    #[must_use]
    pub const fn where_clause(&self) -> Option<&ClauseNode> {
        self.where_clause.as_ref()
    }
}

fn and_where(table: &Table, existing: Option<ClauseNode>, mut clause: ClauseNode) -> ClauseNode {
    correlate_to(table, &mut clause);
    match existing {
        None => clause,
        Some(existing) => ClauseNode::Compound(Compound::new(CompoundOp::And, [existing, clause])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use crate::types::SqlType;
    use crate::value::{params, SqlValue};

    fn users() -> Table {
        Table::new(
            "users",
            vec![
                ColumnDef::new("user_id", SqlType::Integer).primary_key(),
                ColumnDef::new("user_name", SqlType::varchar(40)),
                ColumnDef::new("password", SqlType::varchar(20)),
            ],
        )
    }

    fn bound_value(node: &ClauseNode) -> SqlValue {
        match node {
            ClauseNode::BindParam(b) => b.value().clone(),
            other => panic!("expected bind, got {other:?}"),
        }
    }

    #[test]
    fn test_column_params_default_to_every_column() {
        let ins = users().insert();
        let cols: Vec<_> = ins
            .column_params(None)
            .into_iter()
            .map(|(c, _)| c.name().to_string())
            .collect();
        assert_eq!(cols, vec!["user_id", "user_name", "password"]);
    }

    #[test]
    fn test_call_time_params_override_statement_params() {
        let ins = users().insert().values([("user_name", "jack"), ("password", "pw")]);
        let overrides = params([("user_name", "ed")]);
        let merged = ins.column_params(Some(&overrides));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0.name(), "user_name");
        assert_eq!(bound_value(&merged[0].1), SqlValue::Text("ed".into()));
        assert_eq!(bound_value(&merged[1].1), SqlValue::Text("pw".into()));
    }

    #[test]
    fn test_unknown_columns_are_dropped() {
        let ins = users().insert().values([("nope", 1), ("user_id", 4)]);
        let merged = ins.column_params(None);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].0.name(), "user_id");
    }
}
