//! Per-query state shared by mappers and loaders.
//!
//! Building a mapper SELECT threads a [`SetupContext`] through the eager
//! loaders; reading its rows threads a [`LoadContext`]. Eager targets are
//! always joined under fresh aliases, and the [`TableAdapter`] recorded for
//! each relation path is what lets the loaders find their columns again.

use std::collections::HashMap;

use clausemap_core::{Alias, ClauseNode, ColumnRef, Compiled, Dialect, SqlValue, Table};

use crate::identity::IdentityKey;
use crate::instance::{ClassId, Instance};
use crate::registry::Registry;
use crate::scope::Scope;

/// One result row, addressed by column.
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [SqlValue],
    compiled: Option<&'a Compiled>,
    dialect: &'a dyn Dialect,
}

impl<'a> Row<'a> {
    pub(crate) fn new(
        columns: &'a [String],
        values: &'a [SqlValue],
        compiled: Option<&'a Compiled>,
        dialect: &'a dyn Dialect,
    ) -> Self {
        Self {
            columns,
            values,
            compiled,
            dialect,
        }
    }

    /// Value of `column`, coerced to its type by the dialect.
    ///
    /// The column is found by its compiled label, then by its default
    /// label, then by bare name.
    #[must_use]
    pub fn get(&self, column: &ColumnRef) -> Option<SqlValue> {
        let label = column.label();
        let index = self
            .compiled
            .and_then(|compiled| compiled.label_for(column))
            .and_then(|name| self.position(name))
            .or_else(|| self.position(&label))
            .or_else(|| self.position(column.name()))?;
        let value = self.values.get(index)?.clone();
        Some(self.dialect.coerce_result(value, &column.ty()))
    }

    /// Raw values in result order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        self.values
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Maps tables to the aliases they were joined under.
#[derive(Debug, Clone, Default)]
pub(crate) struct TableAdapter {
    aliases: Vec<(Table, Alias)>,
}

impl TableAdapter {
    pub(crate) fn push(&mut self, table: Table, alias: Alias) {
        self.aliases.push((table, alias));
    }

    pub(crate) fn alias_for(&self, table: &Table) -> Option<&Alias> {
        self.aliases
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, alias)| alias)
    }

    /// The aliased column standing for `column`, or `column` itself.
    pub(crate) fn column(&self, column: &ColumnRef) -> ColumnRef {
        self.translate(column).unwrap_or_else(|| column.clone())
    }

    fn translate(&self, column: &ColumnRef) -> Option<ColumnRef> {
        column
            .table()
            .and_then(|table| self.alias_for(table))
            .and_then(|alias| alias.corresponding_column(column))
    }

    /// Rewrites tables and columns of `node` onto their aliases.
    pub(crate) fn adapt(&self, node: &ClauseNode) -> ClauseNode {
        if self.aliases.is_empty() {
            return node.clone();
        }
        node.replace(&mut |n| match n {
            ClauseNode::Table(table) => self.alias_for(table).cloned().map(ClauseNode::Alias),
            ClauseNode::Column(column) => self.translate(column).map(ClauseNode::Column),
            _ => None,
        })
    }
}

/// Statement-building state for eager joins.
pub(crate) struct SetupContext<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) from: ClauseNode,
    pub(crate) adapters: HashMap<String, TableAdapter>,
    /// Classes on the current eager path, the root first.
    pub(crate) ancestors: Vec<ClassId>,
    aliases: usize,
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(registry: &'a Registry, from: ClauseNode, root: ClassId) -> Self {
        Self {
            registry,
            from,
            adapters: HashMap::new(),
            ancestors: vec![root],
            aliases: 0,
        }
    }

    // Names are `<table>_<n>`, numbered in setup order.
    pub(crate) fn alias(&mut self, table: &Table) -> Alias {
        self.aliases += 1;
        table.alias(format!("{}_{}", table.name(), self.aliases))
    }
}

/// A result row as seen from one eager path.
#[derive(Clone, Copy)]
pub(crate) struct RowView<'v, 'r> {
    pub(crate) row: &'v Row<'r>,
    pub(crate) adapter: &'v TableAdapter,
    pub(crate) path: &'v str,
}

impl RowView<'_, '_> {
    /// Value of `column`, read through the path's aliases.
    pub(crate) fn get(&self, column: &ColumnRef) -> Option<SqlValue> {
        self.row.get(&self.adapter.column(column))
    }
}

/// Row-reading state for one result.
pub(crate) struct LoadContext<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) scope: Scope,
    pub(crate) populate_existing: bool,
    pub(crate) adapters: HashMap<String, TableAdapter>,
    /// Instances met in this result, and whether their attributes are
    /// being populated from it.
    pub(crate) seen: HashMap<IdentityKey, (Instance, bool)>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        scope: Scope,
        populate_existing: bool,
        adapters: HashMap<String, TableAdapter>,
    ) -> Self {
        Self {
            registry,
            scope,
            populate_existing,
            adapters,
            seen: HashMap::new(),
        }
    }

    pub(crate) fn adapter(&self, path: &str) -> TableAdapter {
        self.adapters.get(path).cloned().unwrap_or_default()
    }
}

pub(crate) fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}
