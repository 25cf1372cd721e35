//! SELECT statements.
//!
//! A `Select` keeps an ordered FROM list keyed by FROM identifier. Tables
//! are discovered from every column and criterion appended; a join hides its
//! constituent tables so they are not listed twice. Selects nested in the
//! WHERE clause (or the column list) are correlated: tables already present
//! in the enclosing FROM list are left out of theirs.

use std::collections::BTreeSet;

use super::elements::{Alias, Compound, CompoundOp, Join, OrderItem};
use super::ClauseNode;
use crate::schema::{ColumnRef, Table};

/// An entry in a FROM list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FromEntry {
    /// A base table.
    Table(Table),
    /// An aliased selectable.
    Alias(Alias),
    /// A join.
    Join(Join),
    /// An unaliased subquery.
    Select(Box<Select>),
    /// Placeholder for a table that is rendered as part of a join.
    Hidden,
}

impl FromEntry {
    /// FROM identifier; `None` for hidden entries.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        match self {
            Self::Table(t) => Some(t.fullname()),
            Self::Alias(a) => Some(a.name().to_string()),
            Self::Join(j) => Some(j.id()),
            Self::Select(s) => Some(s.from_id()),
            Self::Hidden => None,
        }
    }

    /// Whether the entry is a join placeholder.
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }
}

/// Set operators combining selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp {
    /// `UNION`
    Union,
    /// `UNION ALL`
    UnionAll,
}

impl SetOp {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
        }
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Select {
    pub(crate) columns: Vec<ClauseNode>,
    pub(crate) froms: Vec<(String, FromEntry)>,
    pub(crate) where_clause: Option<ClauseNode>,
    pub(crate) group_by: Vec<ClauseNode>,
    pub(crate) having: Option<ClauseNode>,
    pub(crate) order_by: Vec<OrderItem>,
    pub(crate) distinct: bool,
    pub(crate) use_labels: bool,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) correlated: Option<BTreeSet<String>>,
    pub(crate) is_where: bool,
    pub(crate) compounds: Vec<(SetOp, Select)>,
}

/// Creates a SELECT of the given columns, tables or expressions.
pub fn select<I, C>(columns: I) -> Select
where
    I: IntoIterator<Item = C>,
    C: Into<ClauseNode>,
{
    let mut stmt = Select::new();
    for column in columns {
        stmt.append_column(column);
    }
    stmt
}

impl Select {
    /// Creates an empty SELECT.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column, table or expression to the column list.
    #[must_use]
    pub fn column(mut self, column: impl Into<ClauseNode>) -> Self {
        self.append_column(column);
        self
    }

    /// ANDs a criterion into the WHERE clause.
    #[must_use]
    pub fn where_(mut self, clause: impl Into<ClauseNode>) -> Self {
        self.append_whereclause(clause);
        self
    }

    /// Adds an explicit FROM element.
    #[must_use]
    pub fn from(mut self, from: impl Into<ClauseNode>) -> Self {
        self.append_from(from);
        self
    }

    /// Adds sort keys.
    #[must_use]
    pub fn order_by<I, O>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderItem>,
    {
        for item in items {
            self.append_order_by(item);
        }
        self
    }

    /// Adds grouping expressions.
    #[must_use]
    pub fn group_by<I, C>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ClauseNode>,
    {
        self.group_by.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Sets the HAVING clause.
    #[must_use]
    pub fn having(mut self, clause: impl Into<ClauseNode>) -> Self {
        let mut clause = clause.into();
        mark_nested(&mut clause);
        self.having = Some(clause);
        self.sync_correlations();
        self
    }

    /// Emits `SELECT DISTINCT`.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Labels every column as `table_column`.
    #[must_use]
    pub const fn use_labels(mut self) -> Self {
        self.use_labels = true;
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets OFFSET.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// `self UNION other`.
    #[must_use]
    pub fn union(mut self, other: Self) -> Self {
        self.compounds.push((SetOp::Union, other));
        self
    }

    /// `self UNION ALL other`.
    #[must_use]
    pub fn union_all(mut self, other: Self) -> Self {
        self.compounds.push((SetOp::UnionAll, other));
        self
    }

    /// Wraps the statement as a named subquery.
    #[must_use]
    pub fn alias(self, name: impl Into<String>) -> Alias {
        Alias::new(self, name)
    }

    /// In-place form of [`Select::column`].
    pub fn append_column(&mut self, column: impl Into<ClauseNode>) {
        let mut column = column.into();
        mark_nested(&mut column);
        self.process_from(&column);
        self.columns.push(column);
        self.sync_correlations();
    }

    /// In-place form of [`Select::where_`].
    pub fn append_whereclause(&mut self, clause: impl Into<ClauseNode>) {
        let mut clause = clause.into();
        mark_nested(&mut clause);
        self.process_from(&clause);
        self.where_clause = Some(match self.where_clause.take() {
            None => clause,
            Some(existing) => {
                ClauseNode::Compound(Compound::new(CompoundOp::And, [existing, clause]))
            }
        });
        self.sync_correlations();
    }

    /// In-place form of [`Select::from`].
    pub fn append_from(&mut self, from: impl Into<ClauseNode>) {
        self.process_from(&from.into());
        self.sync_correlations();
    }

    /// In-place form of [`Select::order_by`].
    pub fn append_order_by(&mut self, item: impl Into<OrderItem>) {
        self.order_by.push(item.into());
    }

    /// Replaces the WHERE clause wholesale.
    pub fn set_where_clause(&mut self, clause: Option<ClauseNode>) {
        self.where_clause = None;
        if let Some(clause) = clause {
            self.append_whereclause(clause);
        }
    }

    /// Sets or clears LIMIT.
    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    /// Sets or clears OFFSET.
    pub fn set_offset(&mut self, offset: Option<u64>) {
        self.offset = offset;
    }

    /// Turns DISTINCT on or off.
    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    /// Turns column labelling on or off.
    pub fn set_use_labels(&mut self, use_labels: bool) {
        self.use_labels = use_labels;
    }

    /// Raw column list.
    #[must_use]
    pub fn columns(&self) -> &[ClauseNode] {
        &self.columns
    }

    /// The WHERE clause.
    #[must_use]
    pub const fn where_clause(&self) -> Option<&ClauseNode> {
        self.where_clause.as_ref()
    }

    /// FROM entries in insertion order, hidden placeholders included.
    pub fn froms(&self) -> impl Iterator<Item = (&str, &FromEntry)> {
        self.froms.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// FROM entries that render, after hiding and correlation.
    #[must_use]
    pub fn visible_froms(&self) -> Vec<&FromEntry> {
        self.froms
            .iter()
            .filter(|(id, entry)| {
                !entry.is_hidden()
                    && !self
                        .correlated
                        .as_ref()
                        .is_some_and(|skip| skip.contains(id))
            })
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Sort keys.
    #[must_use]
    pub fn order_by_items(&self) -> &[OrderItem] {
        &self.order_by
    }

    /// LIMIT, if set.
    #[must_use]
    pub const fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// OFFSET, if set.
    #[must_use]
    pub const fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// Whether DISTINCT is set.
    #[must_use]
    pub const fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Whether columns are labelled.
    #[must_use]
    pub const fn has_labels(&self) -> bool {
        self.use_labels
    }

    /// FROM identifiers this select defers to an enclosing statement.
    #[must_use]
    pub const fn correlated(&self) -> Option<&BTreeSet<String>> {
        self.correlated.as_ref()
    }

    /// Columns as exported to an enclosing alias: `(name, source)`.
    #[must_use]
    pub fn exported_columns(&self) -> Vec<(String, ColumnRef)> {
        self.columns
            .iter()
            .flat_map(ClauseNode::columns)
            .map(|col| {
                let name = if self.use_labels {
                    col.label()
                } else {
                    col.name().to_string()
                };
                (name, col)
            })
            .collect()
    }

    pub(crate) fn from_id(&self) -> String {
        format!("select_{:016x}", ClauseNode::Select(Box::new(self.clone())).structural_key())
    }

    fn from_ids(&self) -> BTreeSet<String> {
        self.froms.iter().map(|(id, _)| id.clone()).collect()
    }

    fn process_from(&mut self, node: &ClauseNode) {
        if let ClauseNode::Join(join) = node {
            self.add_join(join);
            return;
        }
        for entry in node.from_objects() {
            self.add_from(entry);
        }
    }

    fn add_from(&mut self, entry: FromEntry) {
        if let FromEntry::Join(join) = &entry {
            self.add_join(join);
            return;
        }
        let Some(id) = entry.id() else { return };
        if !self.froms.iter().any(|(existing, _)| *existing == id) {
            self.froms.push((id, entry));
        }
    }

    fn add_join(&mut self, join: &Join) {
        for entry in join
            .left
            .from_objects()
            .into_iter()
            .chain(join.right.from_objects())
        {
            if let Some(id) = entry.id() {
                self.set_entry(id, FromEntry::Hidden);
            }
        }
        for entry in join.on.from_objects() {
            self.add_from(entry);
        }
        self.set_entry(join.id(), FromEntry::Join(join.clone()));
    }

    fn set_entry(&mut self, id: String, entry: FromEntry) {
        match self.froms.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = entry,
            None => self.froms.push((id, entry)),
        }
    }

    // Keeps every directly nested select in sync with this FROM list.
    fn sync_correlations(&mut self) {
        let ids = self.from_ids();
        let mut correlate = |nested: &mut Select| {
            nested.is_where = true;
            nested
                .correlated
                .get_or_insert_with(BTreeSet::new)
                .extend(ids.iter().cloned());
        };
        for column in &mut self.columns {
            column.walk_selects_mut(&mut correlate);
        }
        if let Some(clause) = &mut self.where_clause {
            clause.walk_selects_mut(&mut correlate);
        }
        if let Some(clause) = &mut self.having {
            clause.walk_selects_mut(&mut correlate);
        }
    }
}

// Nested selects never contribute to the enclosing FROM list.
fn mark_nested(node: &mut ClauseNode) {
    node.walk_selects_mut(&mut |nested: &mut Select| nested.is_where = true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{and_, exists};
    use crate::schema::ColumnDef;
    use crate::types::SqlType;

    fn users() -> Table {
        Table::new(
            "users",
            vec![
                ColumnDef::new("user_id", SqlType::Integer).primary_key(),
                ColumnDef::new("user_name", SqlType::varchar(40)),
            ],
        )
    }

    fn addresses() -> Table {
        Table::new(
            "addresses",
            vec![
                ColumnDef::new("address_id", SqlType::Integer).primary_key(),
                ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
                ColumnDef::new("email_address", SqlType::varchar(40)),
            ],
        )
    }

    #[test]
    fn test_froms_collected_from_columns_and_where() {
        let u = users();
        let a = addresses();
        let s = select([u.c("user_name")]).where_(a.c("user_id").eq(u.c("user_id")));
        let ids: Vec<_> = s.froms().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["users", "addresses"]);
    }

    #[test]
    fn test_join_hides_its_tables() {
        let u = users();
        let a = addresses();
        let j = u.outerjoin(a.clone()).unwrap();
        let s = select([u.clone(), a]).from(j);
        let visible = s.visible_froms();
        assert_eq!(visible.len(), 1);
        assert!(matches!(visible[0], FromEntry::Join(_)));
    }

    #[test]
    fn test_nested_select_is_correlated() {
        let u = users();
        let a = addresses();
        let inner = select([a.c("address_id")]).where_(a.c("user_id").eq(u.c("user_id")));
        let outer = select([u.clone()]).where_(exists(inner));
        let Some(ClauseNode::Unary(unary)) = outer.where_clause() else {
            panic!("expected EXISTS");
        };
        let ClauseNode::Select(nested) = unary.operand() else {
            panic!("expected nested select");
        };
        assert!(nested.correlated().unwrap().contains("users"));
        let visible: Vec<_> = nested.visible_froms().into_iter().filter_map(FromEntry::id).collect();
        assert_eq!(visible, vec!["addresses"]);
        assert_eq!(outer.visible_froms().len(), 1);
    }

    #[test]
    fn test_correlation_follows_later_froms() {
        let u = users();
        let a = addresses();
        let inner = select([a.c("address_id")]).where_(a.c("user_id").eq(u.c("user_id")));
        let outer = select([ClauseNode::from(u.c("user_id"))])
            .where_(and_([exists(inner)]))
            .from(a.clone());
        let Some(ClauseNode::Compound(compound)) = outer.where_clause() else {
            panic!("expected compound");
        };
        let ClauseNode::Unary(unary) = &compound.clauses()[0] else {
            panic!("expected EXISTS");
        };
        let ClauseNode::Select(nested) = unary.operand() else {
            panic!("expected nested select");
        };
        assert!(nested.visible_froms().is_empty());
    }

    #[test]
    fn test_exported_columns_use_labels() {
        let s = select([users()]).use_labels();
        let names: Vec<_> = s.exported_columns().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["users_user_id", "users_user_name"]);
    }
}
