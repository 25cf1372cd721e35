//! Comparison operators on columns and expressions.
//!
//! Literal operands become bind parameters named after the column they are
//! compared with (`table_column`). Comparing with `NULL` through `eq`
//! produces `IS NULL`; any other operator against `NULL` is rejected when
//! the statement is compiled.

use super::elements::{Binary, BindParam, Compound, CompoundOp, Operator, OrderItem};
use super::select::Select;
use super::ClauseNode;
use crate::schema::ColumnRef;
use crate::value::{SqlValue, ToSqlValue};

/// Right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A literal, bound as a parameter.
    Value(SqlValue),
    /// Another clause element.
    Clause(ClauseNode),
}

/// Conversion into a comparison operand.
pub trait IntoOperand {
    /// Converts `self`.
    fn into_operand(self) -> Operand;
}

impl<T: ToSqlValue> IntoOperand for T {
    fn into_operand(self) -> Operand {
        Operand::Value(self.to_sql_value())
    }
}

impl IntoOperand for ClauseNode {
    fn into_operand(self) -> Operand {
        Operand::Clause(self)
    }
}

impl IntoOperand for ColumnRef {
    fn into_operand(self) -> Operand {
        Operand::Clause(ClauseNode::Column(self))
    }
}

impl IntoOperand for BindParam {
    fn into_operand(self) -> Operand {
        Operand::Clause(ClauseNode::BindParam(self))
    }
}

impl IntoOperand for Select {
    fn into_operand(self) -> Operand {
        Operand::Clause(ClauseNode::Select(Box::new(self)))
    }
}

fn literal_bind(hint: Option<&ColumnRef>, value: SqlValue) -> BindParam {
    match hint {
        Some(column) => BindParam::new(column.label())
            .with_value(value)
            .with_type(column.ty())
            .with_shortname(column.name()),
        None => BindParam::new("literal").with_value(value),
    }
}

fn operand_node(hint: Option<&ColumnRef>, operand: Operand) -> ClauseNode {
    match operand {
        Operand::Value(SqlValue::Null) => ClauseNode::Null,
        Operand::Value(value) => ClauseNode::BindParam(literal_bind(hint, value)),
        Operand::Clause(node) => node,
    }
}

fn compare(left: ClauseNode, op: Operator, right: impl IntoOperand) -> ClauseNode {
    let hint = match &left {
        ClauseNode::Column(c) => Some(c.clone()),
        _ => None,
    };
    let right = operand_node(hint.as_ref(), right.into_operand());
    let op = match (&right, op) {
        (ClauseNode::Null, Operator::Eq) => Operator::Is,
        (_, op) => op,
    };
    ClauseNode::Binary(Binary::new(left, op, right))
}

fn in_list<I, V>(left: ClauseNode, values: I) -> ClauseNode
where
    I: IntoIterator<Item = V>,
    V: IntoOperand,
{
    let hint = match &left {
        ClauseNode::Column(c) => Some(c.clone()),
        _ => None,
    };
    let mut items: Vec<ClauseNode> = values
        .into_iter()
        .map(|v| operand_node(hint.as_ref(), v.into_operand()))
        .collect();
    match items.len() {
        // Degenerates to a condition that is never true.
        0 => ClauseNode::Binary(Binary::new(left, Operator::Eq, ClauseNode::Null)),
        1 => compare(left, Operator::Eq, items.remove(0)),
        _ => ClauseNode::Binary(Binary::new(
            left,
            Operator::In,
            Compound::new(CompoundOp::Comma, items).parenthesized(),
        )),
    }
}

macro_rules! comparison_methods {
    ($ty:ty) => {
        impl $ty {
            /// `self = other`, or `self IS NULL` for a null operand.
            #[must_use]
            pub fn eq(&self, other: impl IntoOperand) -> ClauseNode {
                compare(self.clone().into(), Operator::Eq, other)
            }

            /// `self != other`.
            #[must_use]
            pub fn ne(&self, other: impl IntoOperand) -> ClauseNode {
                compare(self.clone().into(), Operator::NotEq, other)
            }

            /// `self < other`.
            #[must_use]
            pub fn lt(&self, other: impl IntoOperand) -> ClauseNode {
                compare(self.clone().into(), Operator::Lt, other)
            }

            /// `self <= other`.
            #[must_use]
            pub fn le(&self, other: impl IntoOperand) -> ClauseNode {
                compare(self.clone().into(), Operator::LtEq, other)
            }

            /// `self > other`.
            #[must_use]
            pub fn gt(&self, other: impl IntoOperand) -> ClauseNode {
                compare(self.clone().into(), Operator::Gt, other)
            }

            /// `self >= other`.
            #[must_use]
            pub fn ge(&self, other: impl IntoOperand) -> ClauseNode {
                compare(self.clone().into(), Operator::GtEq, other)
            }

            /// `self LIKE pattern`.
            #[must_use]
            pub fn like(&self, pattern: impl IntoOperand) -> ClauseNode {
                compare(self.clone().into(), Operator::Like, pattern)
            }

            /// `self LIKE 'prefix%'`.
            #[must_use]
            pub fn startswith(&self, prefix: &str) -> ClauseNode {
                self.like(format!("{prefix}%"))
            }

            /// `self LIKE '%suffix'`.
            #[must_use]
            pub fn endswith(&self, suffix: &str) -> ClauseNode {
                self.like(format!("%{suffix}"))
            }

            /// `self IN (values...)`; an empty list renders `self = NULL`.
            #[must_use]
            pub fn in_<I, V>(&self, values: I) -> ClauseNode
            where
                I: IntoIterator<Item = V>,
                V: IntoOperand,
            {
                in_list(self.clone().into(), values)
            }

            /// `self IN (subquery)`.
            #[must_use]
            pub fn in_select(&self, subquery: Select) -> ClauseNode {
                ClauseNode::Binary(Binary::new(self.clone(), Operator::In, subquery))
            }

            /// `self BETWEEN low AND high`.
            #[must_use]
            pub fn between(&self, low: impl IntoOperand, high: impl IntoOperand) -> ClauseNode {
                let left: ClauseNode = self.clone().into();
                let hint = match &left {
                    ClauseNode::Column(c) => Some(c.clone()),
                    _ => None,
                };
                let bounds = Compound::new(
                    CompoundOp::And,
                    [
                        operand_node(hint.as_ref(), low.into_operand()),
                        operand_node(hint.as_ref(), high.into_operand()),
                    ],
                );
                ClauseNode::Binary(Binary::new(left, Operator::Between, bounds))
            }

            /// `self IS NULL`.
            #[must_use]
            pub fn is_null(&self) -> ClauseNode {
                ClauseNode::Binary(Binary::new(self.clone(), Operator::Is, ClauseNode::Null))
            }

            /// `self IS NOT NULL`.
            #[must_use]
            pub fn is_not_null(&self) -> ClauseNode {
                ClauseNode::Binary(Binary::new(self.clone(), Operator::IsNot, ClauseNode::Null))
            }

            /// Ascending sort key.
            #[must_use]
            pub fn asc(&self) -> OrderItem {
                super::elements::asc(self.clone())
            }

            /// Descending sort key.
            #[must_use]
            pub fn desc(&self) -> OrderItem {
                super::elements::desc(self.clone())
            }
        }
    };
}

comparison_methods!(ColumnRef);
comparison_methods!(ClauseNode);
