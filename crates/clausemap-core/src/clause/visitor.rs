//! Depth-first traversal of clause trees.

use super::elements::{Alias, Binary, BindParam, Compound, Join, TextClause, Unary};
use super::select::{FromEntry, Select};
use super::{ClauseNode, Delete, Insert, Update};
use crate::schema::{ColumnRef, Table};

/// Callbacks invoked after a node's children have been visited.
#[allow(unused_variables)]
pub trait Visitor {
    /// A table.
    fn visit_table(&mut self, table: &Table) {}
    /// A column reference.
    fn visit_column(&mut self, column: &ColumnRef) {}
    /// An alias.
    fn visit_alias(&mut self, alias: &Alias) {}
    /// A join.
    fn visit_join(&mut self, join: &Join) {}
    /// A bind parameter.
    fn visit_bindparam(&mut self, bind: &BindParam) {}
    /// Literal SQL.
    fn visit_text(&mut self, text: &TextClause) {}
    /// `NULL`.
    fn visit_null(&mut self) {}
    /// A prefix operator.
    fn visit_unary(&mut self, unary: &Unary) {}
    /// A binary comparison.
    fn visit_binary(&mut self, binary: &Binary) {}
    /// A compound clause.
    fn visit_compound(&mut self, compound: &Compound) {}
    /// A SELECT.
    fn visit_select(&mut self, select: &Select) {}
    /// An INSERT.
    fn visit_insert(&mut self, insert: &Insert) {}
    /// An UPDATE.
    fn visit_update(&mut self, update: &Update) {}
    /// A DELETE.
    fn visit_delete(&mut self, delete: &Delete) {}
}

impl ClauseNode {
    /// Walks the tree depth-first, children before parents.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Self::Table(t) => visitor.visit_table(t),
            Self::Column(c) => visitor.visit_column(c),
            Self::Alias(a) => {
                a.inner().accept(visitor);
                visitor.visit_alias(a);
            }
            Self::Join(j) => {
                j.left.accept(visitor);
                j.right.accept(visitor);
                j.on.accept(visitor);
                visitor.visit_join(j);
            }
            Self::BindParam(b) => visitor.visit_bindparam(b),
            Self::Text(t) => visitor.visit_text(t),
            Self::Null => visitor.visit_null(),
            Self::Unary(u) => {
                u.operand.accept(visitor);
                visitor.visit_unary(u);
            }
            Self::Binary(b) => {
                b.left.accept(visitor);
                b.right.accept(visitor);
                visitor.visit_binary(b);
            }
            Self::Compound(c) => {
                for clause in &c.clauses {
                    clause.accept(visitor);
                }
                visitor.visit_compound(c);
            }
            Self::Select(s) => {
                for column in &s.columns {
                    column.accept(visitor);
                }
                for (_, entry) in &s.froms {
                    match entry {
                        FromEntry::Table(t) => visitor.visit_table(t),
                        FromEntry::Alias(a) => Self::Alias(a.clone()).accept(visitor),
                        FromEntry::Join(j) => Self::Join(j.clone()).accept(visitor),
                        FromEntry::Select(inner) => Self::Select(inner.clone()).accept(visitor),
                        FromEntry::Hidden => {}
                    }
                }
                if let Some(clause) = &s.where_clause {
                    clause.accept(visitor);
                }
                visitor.visit_select(s);
            }
            Self::Insert(i) => {
                for (_, value) in i.parameters.iter().flatten() {
                    value.accept(visitor);
                }
                visitor.visit_insert(i);
            }
            Self::Update(u) => {
                for (_, value) in u.parameters.iter().flatten() {
                    value.accept(visitor);
                }
                if let Some(clause) = &u.where_clause {
                    clause.accept(visitor);
                }
                visitor.visit_update(u);
            }
            Self::Delete(d) => {
                if let Some(clause) = &d.where_clause {
                    clause.accept(visitor);
                }
                visitor.visit_delete(d);
            }
        }
    }
}

/// Collects the distinct base tables of a tree.
#[derive(Debug, Default)]
pub struct TableFinder {
    tables: Vec<Table>,
}

impl TableFinder {
    /// The tables found, in discovery order.
    #[must_use]
    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }
}

impl Visitor for TableFinder {
    fn visit_table(&mut self, table: &Table) {
        if !self.tables.contains(table) {
            self.tables.push(table.clone());
        }
    }
}
