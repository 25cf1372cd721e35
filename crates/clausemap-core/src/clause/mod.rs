//! The clause tree.
//!
//! Every SQL construct is a [`ClauseNode`]. Nodes are plain values: equal
//! trees compare equal and hash identically, which makes the tree itself
//! usable as a cache key (see [`ClauseNode::structural_key`]).

mod dml;
mod elements;
mod operators;
mod select;
mod visitor;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub use dml::{Delete, Insert, Update};
pub use elements::{
    asc, desc, Alias, Binary, BindParam, Compound, CompoundOp, Join, Operator, OrderItem,
    TextClause, Unary, UnaryOp,
};
pub use operators::{IntoOperand, Operand};
pub use select::{select, FromEntry, Select, SetOp};
pub use visitor::{TableFinder, Visitor};

use crate::schema::{ColumnOwner, ColumnRef, Table};
use crate::value::SqlValue;

/// A node in the clause tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClauseNode {
    /// A table.
    Table(Table),
    /// A column reference.
    Column(ColumnRef),
    /// An aliased selectable.
    Alias(Alias),
    /// A join.
    Join(Join),
    /// A bind parameter.
    BindParam(BindParam),
    /// Literal SQL.
    Text(TextClause),
    /// `NULL`.
    Null,
    /// A prefix operator.
    Unary(Unary),
    /// A binary comparison.
    Binary(Binary),
    /// Clauses joined by one operator.
    Compound(Compound),
    /// A SELECT.
    Select(Box<Select>),
    /// An INSERT.
    Insert(Box<Insert>),
    /// An UPDATE.
    Update(Box<Update>),
    /// A DELETE.
    Delete(Box<Delete>),
}

impl ClauseNode {
    /// Hash of the tree's structure. Equal trees have equal keys.
    #[must_use]
    pub fn structural_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Identifier under which this node appears in a FROM list.
    #[must_use]
    pub fn from_id(&self) -> String {
        match self {
            Self::Table(t) => t.fullname(),
            Self::Alias(a) => a.name().to_string(),
            Self::Join(j) => j.id(),
            Self::Select(s) => s.from_id(),
            Self::Column(c) => c.qualified_name(),
            other => format!("clause_{:016x}", other.structural_key()),
        }
    }

    /// The FROM entries this node contributes to an enclosing SELECT.
    #[must_use]
    pub fn from_objects(&self) -> Vec<FromEntry> {
        match self {
            Self::Table(t) => vec![FromEntry::Table(t.clone())],
            Self::Column(c) => match c.owner() {
                ColumnOwner::Table(t) => vec![FromEntry::Table(t.clone())],
                ColumnOwner::Alias(a) => vec![FromEntry::Alias(a.clone())],
                ColumnOwner::Anonymous => Vec::new(),
            },
            Self::Alias(a) => vec![FromEntry::Alias(a.clone())],
            Self::Join(j) => {
                let mut froms = vec![FromEntry::Join(j.clone())];
                froms.extend(j.left.from_objects());
                froms.extend(j.right.from_objects());
                froms.extend(j.on.from_objects());
                froms
            }
            Self::Unary(u) => u.operand.from_objects(),
            Self::Binary(b) => {
                let mut froms = b.left.from_objects();
                froms.extend(b.right.from_objects());
                froms
            }
            Self::Compound(c) => c.clauses.iter().flat_map(Self::from_objects).collect(),
            Self::Select(s) if !s.is_where => vec![FromEntry::Select(s.clone())],
            Self::Select(_)
            | Self::BindParam(_)
            | Self::Text(_)
            | Self::Null
            | Self::Insert(_)
            | Self::Update(_)
            | Self::Delete(_) => Vec::new(),
        }
    }

    /// Columns of a selectable, or the column itself.
    #[must_use]
    pub fn columns(&self) -> Vec<ColumnRef> {
        match self {
            Self::Table(t) => t.columns(),
            Self::Alias(a) => a.columns(),
            Self::Join(j) => j.columns(),
            Self::Column(c) => vec![c.clone()],
            _ => Vec::new(),
        }
    }

    /// Columns as seen by an enclosing alias: `(exported name, column)`.
    #[must_use]
    pub fn exported_columns(&self) -> Vec<(String, ColumnRef)> {
        match self {
            Self::Select(s) => s.exported_columns(),
            other => other
                .columns()
                .into_iter()
                .map(|c| (c.name().to_string(), c))
                .collect(),
        }
    }

    /// Base tables referenced anywhere in the tree, in discovery order.
    #[must_use]
    pub fn tables(&self) -> Vec<Table> {
        let mut finder = TableFinder::default();
        self.accept(&mut finder);
        finder.into_tables()
    }

    /// Rebuilds the tree, replacing every node for which `f` returns
    /// `Some`. Replaced nodes are not descended into; statements are
    /// treated as leaves.
    #[must_use]
    pub fn replace(&self, f: &mut dyn FnMut(&Self) -> Option<Self>) -> Self {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Self::Unary(u) => Self::Unary(Unary {
                op: u.op,
                operand: Box::new(u.operand.replace(f)),
            }),
            Self::Binary(b) => Self::Binary(Binary {
                left: Box::new(b.left.replace(f)),
                right: Box::new(b.right.replace(f)),
                op: b.op,
            }),
            Self::Compound(c) => Self::Compound(Compound {
                op: c.op,
                clauses: c.clauses.iter().map(|clause| clause.replace(f)).collect(),
                parens: c.parens,
            }),
            Self::Join(j) => Self::Join(Join {
                left: Box::new(j.left.replace(f)),
                right: Box::new(j.right.replace(f)),
                on: Box::new(j.on.replace(f)),
                outer: j.outer,
            }),
            other => other.clone(),
        }
    }

    // Visits selects nested directly in an expression, without entering them.
    pub(crate) fn walk_selects_mut(&mut self, f: &mut dyn FnMut(&mut Select)) {
        match self {
            Self::Select(s) => f(s),
            Self::Unary(u) => u.operand.walk_selects_mut(f),
            Self::Binary(b) => {
                b.left.walk_selects_mut(f);
                b.right.walk_selects_mut(f);
            }
            Self::Compound(c) => {
                for clause in &mut c.clauses {
                    clause.walk_selects_mut(f);
                }
            }
            _ => {}
        }
    }
}

macro_rules! node_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for ClauseNode {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    };
    (boxed $variant:ident, $ty:ty) => {
        impl From<$ty> for ClauseNode {
            fn from(value: $ty) -> Self {
                Self::$variant(Box::new(value))
            }
        }
    };
}

node_from!(Table, Table);
node_from!(Column, ColumnRef);
node_from!(Alias, Alias);
node_from!(Join, Join);
node_from!(BindParam, BindParam);
node_from!(Text, TextClause);
node_from!(Unary, Unary);
node_from!(Binary, Binary);
node_from!(Compound, Compound);
node_from!(boxed Select, Select);
node_from!(boxed Insert, Insert);
node_from!(boxed Update, Update);
node_from!(boxed Delete, Delete);

impl From<&Table> for ClauseNode {
    fn from(value: &Table) -> Self {
        Self::Table(value.clone())
    }
}

/// `AND` of the given clauses.
pub fn and_(clauses: impl IntoIterator<Item = ClauseNode>) -> ClauseNode {
    ClauseNode::Compound(Compound::new(CompoundOp::And, clauses))
}

/// `OR` of the given clauses.
pub fn or_(clauses: impl IntoIterator<Item = ClauseNode>) -> ClauseNode {
    ClauseNode::Compound(Compound::new(CompoundOp::Or, clauses))
}

/// `NOT clause`.
pub fn not_(clause: impl Into<ClauseNode>) -> ClauseNode {
    let operand = match clause.into() {
        ClauseNode::Compound(c) => ClauseNode::Compound(c.parenthesized()),
        other => other,
    };
    ClauseNode::Unary(Unary {
        op: UnaryOp::Not,
        operand: Box::new(operand),
    })
}

/// `EXISTS (subquery)`.
pub fn exists(subquery: Select) -> ClauseNode {
    ClauseNode::Unary(Unary {
        op: UnaryOp::Exists,
        operand: Box::new(ClauseNode::Select(Box::new(subquery))),
    })
}

/// Literal SQL; `:name` tokens become bind parameters.
pub fn text(sql: impl Into<String>) -> ClauseNode {
    ClauseNode::Text(TextClause::new(sql))
}

/// `NULL`.
#[must_use]
pub const fn null() -> ClauseNode {
    ClauseNode::Null
}

/// A named bind parameter with a default value.
pub fn bindparam(key: impl Into<String>, value: impl crate::value::ToSqlValue) -> ClauseNode {
    ClauseNode::BindParam(BindParam::new(key).with_value(value.to_sql_value()))
}

/// A free-standing literal bound as a parameter.
pub fn literal(value: impl crate::value::ToSqlValue) -> ClauseNode {
    let value: SqlValue = value.to_sql_value();
    ClauseNode::BindParam(BindParam::new("literal").with_value(value))
}

/// Inner join of `left` and `right` on `on`.
pub fn join(left: impl Into<ClauseNode>, right: impl Into<ClauseNode>, on: impl Into<ClauseNode>) -> Join {
    Join::new(left, right, on, false)
}

/// Left outer join of `left` and `right` on `on`.
pub fn outerjoin(
    left: impl Into<ClauseNode>,
    right: impl Into<ClauseNode>,
    on: impl Into<ClauseNode>,
) -> Join {
    Join::new(left, right, on, true)
}

/// Aliases a selectable.
pub fn alias(selectable: impl Into<ClauseNode>, name: impl Into<String>) -> Alias {
    Alias::new(selectable, name)
}

/// INSERT into `table`.
#[must_use]
pub fn insert(table: &Table) -> Insert {
    Insert::new(table.clone())
}

/// UPDATE of `table`.
#[must_use]
pub fn update(table: &Table) -> Update {
    Update::new(table.clone())
}

/// DELETE from `table`.
#[must_use]
pub fn delete(table: &Table) -> Delete {
    Delete::new(table.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_structural_key_equal_for_equal_trees() {
        let a = select([users()]).where_(users().c("user_id").eq(7));
        let b = select([users()]).where_(users().c("user_id").eq(7));
        let c = select([users()]).where_(users().c("user_id").eq(8));
        let (a, b, c) = (ClauseNode::from(a), ClauseNode::from(b), ClauseNode::from(c));
        assert_eq!(a.structural_key(), b.structural_key());
        assert_ne!(a.structural_key(), c.structural_key());
    }

    #[test]
    fn test_replace_swaps_columns() {
        let t = users();
        let alias = t.alias("u2");
        let clause = and_([t.c("user_id").eq(5), t.c("user_name").eq("x")]);
        let rewritten = clause.replace(&mut |node| match node {
            ClauseNode::Column(c) => alias.corresponding_column(c).map(ClauseNode::Column),
            _ => None,
        });
        let tables: Vec<_> = rewritten
            .from_objects()
            .into_iter()
            .filter_map(|f| f.id())
            .collect();
        assert_eq!(tables, vec!["u2", "u2"]);
    }

    #[test]
    fn test_null_equality_becomes_is() {
        let clause = users().c("user_name").eq(None::<String>);
        let ClauseNode::Binary(b) = clause else {
            panic!("expected binary");
        };
        assert_eq!(b.op(), Operator::Is);
        assert_eq!(b.right(), &ClauseNode::Null);
    }

    #[test]
    fn test_literal_binds_named_after_column() {
        let clause = users().c("user_id").eq(7);
        let ClauseNode::Binary(b) = clause else {
            panic!("expected binary");
        };
        let ClauseNode::BindParam(bind) = b.right() else {
            panic!("expected bind");
        };
        assert_eq!(bind.key(), "users_user_id");
        assert_eq!(bind.shortname(), Some("user_id"));
        assert_eq!(bind.value(), &SqlValue::Int(7));
    }

    #[test]
    fn test_join_infers_condition_from_foreign_key() {
        let addresses = Table::new(
            "addresses",
            vec![
                ColumnDef::new("address_id", SqlType::Integer).primary_key(),
                ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
            ],
        );
        let j = users().join(addresses.clone()).unwrap();
        assert_eq!(
            j.on_clause(),
            &users().c("user_id").eq(addresses.c("user_id"))
        );
        assert_eq!(j.id(), "users_addresses");
    }

    #[test]
    fn test_join_from_objects_include_on_clause_tables() {
        let addresses = Table::new(
            "addresses",
            vec![ColumnDef::new("user_id", SqlType::Integer).references("users.user_id")],
        );
        let flags = Table::new("flags", vec![ColumnDef::new("user_id", SqlType::Integer)]);
        let on = and_([
            users().c("user_id").eq(addresses.c("user_id")),
            flags.c("user_id").eq(users().c("user_id")),
        ]);
        let join = ClauseNode::from(Join::new(users(), addresses, on, false));
        let ids: Vec<String> = join.from_objects().iter().filter_map(FromEntry::id).collect();
        assert_eq!(ids[..3], ["users_addresses", "users", "addresses"]);
        assert!(ids.contains(&"flags".to_string()));
    }

    #[test]
    fn test_join_without_foreign_key_fails() {
        let other = Table::new("other", vec![ColumnDef::new("id", SqlType::Integer)]);
        assert!(users().join(other).is_err());
    }
}
