//! Mapper properties: column attributes and relations.

mod column;
mod relation;

pub use column::ColumnProperty;
pub use relation::{relation, Direction, LoadStrategy, Relation, RelationDef, RelationState, RelationTarget};
pub(crate) use relation::{equalities, owned_by, table_matches, SyncPair};

use clausemap_core::ColumnRef;

/// One attribute of a mapped class.
#[derive(Debug, Clone)]
pub enum MapperProperty {
    /// A scalar attribute backed by one or more columns.
    Column(ColumnProperty),
    /// A reference to objects of another mapper.
    Relation(Relation),
}

impl MapperProperty {
    /// The column property, if this is one.
    #[must_use]
    pub const fn as_column(&self) -> Option<&ColumnProperty> {
        match self {
            Self::Column(column) => Some(column),
            Self::Relation(_) => None,
        }
    }

    /// The relation, if this is one.
    #[must_use]
    pub const fn as_relation(&self) -> Option<&Relation> {
        match self {
            Self::Relation(relation) => Some(relation),
            Self::Column(_) => None,
        }
    }
}

/// A property as declared on a [`MapperBuilder`](crate::MapperBuilder).
#[derive(Debug, Clone)]
pub enum PropertyDef {
    /// Columns merged into one attribute.
    Columns(Vec<ColumnRef>),
    /// A relation.
    Relation(RelationDef),
}

impl From<ColumnRef> for PropertyDef {
    fn from(column: ColumnRef) -> Self {
        Self::Columns(vec![column])
    }
}

impl From<Vec<ColumnRef>> for PropertyDef {
    fn from(columns: Vec<ColumnRef>) -> Self {
        Self::Columns(columns)
    }
}

impl From<RelationDef> for PropertyDef {
    fn from(def: RelationDef) -> Self {
        Self::Relation(def)
    }
}

impl From<PropertyDef> for MapperProperty {
    fn from(def: PropertyDef) -> Self {
        match def {
            PropertyDef::Columns(columns) => Self::Column(ColumnProperty::new(columns)),
            PropertyDef::Relation(def) => Self::Relation(Relation::new(def)),
        }
    }
}
