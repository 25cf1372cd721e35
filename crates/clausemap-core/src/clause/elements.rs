//! Leaf and composite clause elements.

use std::fmt;
use std::sync::Arc;

use super::ClauseNode;
use crate::error::{CompileError, Result};
use crate::schema::ColumnRef;
use crate::types::SqlType;
use crate::value::SqlValue;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `LIKE`
    Like,
    /// `IN`
    In,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `BETWEEN`
    Between,
}

impl Operator {
    /// Returns the SQL representation of this operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::Between => "BETWEEN",
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `NOT`
    Not,
    /// `EXISTS`
    Exists,
}

/// Operators joining the members of a [`Compound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompoundOp {
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `,` (value lists)
    Comma,
}

impl CompoundOp {
    pub(crate) const fn separator(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
            Self::Comma => ", ",
        }
    }
}

/// `left op right`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub(crate) left: Box<ClauseNode>,
    pub(crate) right: Box<ClauseNode>,
    pub(crate) op: Operator,
}

impl Binary {
    /// Creates a binary expression.
    #[must_use]
    pub fn new(left: impl Into<ClauseNode>, op: Operator, right: impl Into<ClauseNode>) -> Self {
        Self {
            left: Box::new(left.into()),
            right: Box::new(right.into()),
            op,
        }
    }

    /// Left operand.
    #[must_use]
    pub fn left(&self) -> &ClauseNode {
        &self.left
    }

    /// Right operand.
    #[must_use]
    pub fn right(&self) -> &ClauseNode {
        &self.right
    }

    /// Operator.
    #[must_use]
    pub const fn op(&self) -> Operator {
        self.op
    }

    /// The same comparison with its operands exchanged.
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            left: self.right,
            right: self.left,
            op: self.op,
        }
    }
}

/// A prefix operator applied to one operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unary {
    pub(crate) op: UnaryOp,
    pub(crate) operand: Box<ClauseNode>,
}

impl Unary {
    /// The operator.
    #[must_use]
    pub const fn op(&self) -> UnaryOp {
        self.op
    }

    /// The operand.
    #[must_use]
    pub fn operand(&self) -> &ClauseNode {
        &self.operand
    }
}

/// Clauses joined by one operator, optionally parenthesized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Compound {
    pub(crate) op: CompoundOp,
    pub(crate) clauses: Vec<ClauseNode>,
    pub(crate) parens: bool,
}

impl Compound {
    /// Creates a compound; nested compounds are parenthesized.
    #[must_use]
    pub fn new(op: CompoundOp, clauses: impl IntoIterator<Item = ClauseNode>) -> Self {
        let clauses = clauses
            .into_iter()
            .map(|clause| match clause {
                ClauseNode::Compound(mut inner) => {
                    inner.parens = true;
                    ClauseNode::Compound(inner)
                }
                other => other,
            })
            .collect();
        Self {
            op,
            clauses,
            parens: false,
        }
    }

    /// The joining operator.
    #[must_use]
    pub const fn op(&self) -> CompoundOp {
        self.op
    }

    /// Members in order.
    #[must_use]
    pub fn clauses(&self) -> &[ClauseNode] {
        &self.clauses
    }

    /// Appends a member.
    pub fn push(&mut self, clause: ClauseNode) {
        let clause = match clause {
            ClauseNode::Compound(mut inner) => {
                inner.parens = true;
                ClauseNode::Compound(inner)
            }
            other => other,
        };
        self.clauses.push(clause);
    }

    /// Whether the compound renders inside parentheses.
    #[must_use]
    pub const fn is_parenthesized(&self) -> bool {
        self.parens
    }

    /// Forces parentheses.
    #[must_use]
    pub const fn parenthesized(mut self) -> Self {
        self.parens = true;
        self
    }
}

/// A named bind parameter with a default value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindParam {
    key: String,
    value: SqlValue,
    ty: SqlType,
    shortname: Option<String>,
}

impl BindParam {
    /// Creates a parameter with a `NULL` default.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: SqlValue::Null,
            ty: SqlType::Null,
            shortname: None,
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_value(mut self, value: SqlValue) -> Self {
        self.value = value;
        self
    }

    /// Sets the value type.
    #[must_use]
    pub const fn with_type(mut self, ty: SqlType) -> Self {
        self.ty = ty;
        self
    }

    /// Sets the secondary lookup name.
    #[must_use]
    pub fn with_shortname(mut self, shortname: impl Into<String>) -> Self {
        self.shortname = Some(shortname.into());
        self
    }

    /// Bind name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Default value.
    #[must_use]
    pub const fn value(&self) -> &SqlValue {
        &self.value
    }

    /// Value type.
    #[must_use]
    pub const fn ty(&self) -> SqlType {
        self.ty
    }

    /// Secondary lookup name.
    #[must_use]
    pub fn shortname(&self) -> Option<&str> {
        self.shortname.as_deref()
    }
}

/// Literal SQL. `:name` tokens become bind parameters at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextClause {
    text: String,
}

impl TextClause {
    /// Wraps raw SQL.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The raw SQL.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderItem {
    pub(crate) expr: ClauseNode,
    pub(crate) descending: bool,
}

impl OrderItem {
    /// The sort expression.
    #[must_use]
    pub const fn expr(&self) -> &ClauseNode {
        &self.expr
    }

    /// Whether the sort is descending.
    #[must_use]
    pub const fn is_descending(&self) -> bool {
        self.descending
    }
}

impl From<ColumnRef> for OrderItem {
    fn from(column: ColumnRef) -> Self {
        Self {
            expr: ClauseNode::Column(column),
            descending: false,
        }
    }
}

impl From<ClauseNode> for OrderItem {
    fn from(expr: ClauseNode) -> Self {
        Self {
            expr,
            descending: false,
        }
    }
}

/// Ascending sort on `expr`.
pub fn asc(expr: impl Into<ClauseNode>) -> OrderItem {
    OrderItem {
        expr: expr.into(),
        descending: false,
    }
}

/// Descending sort on `expr`.
pub fn desc(expr: impl Into<ClauseNode>) -> OrderItem {
    OrderItem {
        expr: expr.into(),
        descending: true,
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct AliasDef {
    inner: ClauseNode,
    name: String,
}

/// A selectable under another name.
///
/// Its columns are proxies owned by the alias; each remembers the physical
/// column it stands for.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Alias(Arc<AliasDef>);

impl Alias {
    /// Aliases `inner` as `name`.
    #[must_use]
    pub fn new(inner: impl Into<ClauseNode>, name: impl Into<String>) -> Self {
        Self(Arc::new(AliasDef {
            inner: inner.into(),
            name: name.into(),
        }))
    }

    /// The alias name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The aliased selectable.
    #[must_use]
    pub fn inner(&self) -> &ClauseNode {
        &self.0.inner
    }

    /// Column proxies, one per exported column of the inner selectable.
    #[must_use]
    pub fn columns(&self) -> Vec<ColumnRef> {
        self.0
            .inner
            .exported_columns()
            .into_iter()
            .map(|(name, source)| ColumnRef::proxy(&source, self, name))
            .collect()
    }

    /// Looks up a proxy by exported name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<ColumnRef> {
        self.columns().into_iter().find(|c| c.name() == name)
    }

    /// Returns the named proxy.
    ///
    /// # Panics
    ///
    /// Panics if the alias exports no such column.
    #[must_use]
    pub fn c(&self, name: &str) -> ColumnRef {
        match self.column(name) {
            Some(column) => column,
            None => panic!("alias '{}' has no column '{name}'", self.name()),
        }
    }

    /// The proxy standing for the same physical column as `column`.
    #[must_use]
    pub fn corresponding_column(&self, column: &ColumnRef) -> Option<ColumnRef> {
        self.columns()
            .into_iter()
            .find(|c| c.same_origin(column))
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alias({})", self.0.name)
    }
}

/// Two selectables joined on a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Join {
    pub(crate) left: Box<ClauseNode>,
    pub(crate) right: Box<ClauseNode>,
    pub(crate) on: Box<ClauseNode>,
    pub(crate) outer: bool,
}

impl Join {
    /// Joins `left` and `right` on `on`.
    #[must_use]
    pub fn new(
        left: impl Into<ClauseNode>,
        right: impl Into<ClauseNode>,
        on: impl Into<ClauseNode>,
        outer: bool,
    ) -> Self {
        Self {
            left: Box::new(left.into()),
            right: Box::new(right.into()),
            on: Box::new(on.into()),
            outer,
        }
    }

    /// Joins `left` and `right`, deriving the condition from foreign keys.
    ///
    /// Every foreign key between the two sides contributes one equality;
    /// several are combined with `AND`.
    ///
    /// # Errors
    ///
    /// Returns a compile error when no foreign key joins the two sides.
    pub fn infer(
        left: impl Into<ClauseNode>,
        right: impl Into<ClauseNode>,
        outer: bool,
    ) -> Result<Self> {
        let left = left.into();
        let right = right.into();
        let on = infer_join_condition(&left, &right)?;
        Ok(Self::new(left, right, on, outer))
    }

    /// Chains another inner join onto this one.
    #[must_use]
    pub fn join(self, right: impl Into<ClauseNode>, on: impl Into<ClauseNode>) -> Self {
        Self::new(self, right, on, false)
    }

    /// Chains another outer join onto this one.
    #[must_use]
    pub fn outerjoin(self, right: impl Into<ClauseNode>, on: impl Into<ClauseNode>) -> Self {
        Self::new(self, right, on, true)
    }

    /// Left side.
    #[must_use]
    pub fn left(&self) -> &ClauseNode {
        &self.left
    }

    /// Right side.
    #[must_use]
    pub fn right(&self) -> &ClauseNode {
        &self.right
    }

    /// Join condition.
    #[must_use]
    pub fn on_clause(&self) -> &ClauseNode {
        &self.on
    }

    /// Whether this is a `LEFT OUTER JOIN`.
    #[must_use]
    pub const fn is_outer(&self) -> bool {
        self.outer
    }

    /// FROM identifier: the ids of both sides joined by `_`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}_{}", self.left.from_id(), self.right.from_id())
    }

    /// Columns of both sides.
    #[must_use]
    pub fn columns(&self) -> Vec<ColumnRef> {
        let mut cols = self.left.columns();
        cols.extend(self.right.columns());
        cols
    }
}

fn table_matches(fullname: &str, reference: &str) -> bool {
    fullname == reference || fullname.rsplit('.').next() == Some(reference)
}

fn infer_join_condition(left: &ClauseNode, right: &ClauseNode) -> Result<ClauseNode> {
    let left_cols = left.columns();
    let right_cols = right.columns();
    let mut criteria: Vec<ClauseNode> = Vec::new();

    // Foreign keys on the right side referencing the left side.
    for table in right.tables() {
        for fk in table.foreign_keys() {
            let fk_col = right_cols.iter().find(|c| {
                c.origin().table == table.fullname() && c.origin().column == fk.column
            });
            let ref_col = left_cols.iter().find(|c| {
                table_matches(&c.origin().table, &fk.ref_table) && c.origin().column == fk.ref_column
            });
            if let (Some(fk_col), Some(ref_col)) = (fk_col, ref_col) {
                let crit = ClauseNode::Binary(Binary::new(ref_col.clone(), Operator::Eq, fk_col.clone()));
                if !criteria.contains(&crit) {
                    criteria.push(crit);
                }
            }
        }
    }

    // Foreign keys on the left side referencing the right side.
    for table in left.tables() {
        for fk in table.foreign_keys() {
            let fk_col = left_cols.iter().find(|c| {
                c.origin().table == table.fullname() && c.origin().column == fk.column
            });
            let ref_col = right_cols.iter().find(|c| {
                table_matches(&c.origin().table, &fk.ref_table) && c.origin().column == fk.ref_column
            });
            if let (Some(fk_col), Some(ref_col)) = (fk_col, ref_col) {
                let crit = ClauseNode::Binary(Binary::new(fk_col.clone(), Operator::Eq, ref_col.clone()));
                if !criteria.contains(&crit) {
                    criteria.push(crit);
                }
            }
        }
    }

    match criteria.len() {
        0 => Err(CompileError::NoJoinCondition {
            left: left.from_id(),
            right: right.from_id(),
        }),
        1 => Ok(criteria.remove(0)),
        _ => Ok(ClauseNode::Compound(Compound::new(CompoundOp::And, criteria))),
    }
}
