//! Mapper construction.

use std::collections::HashMap;
use std::sync::Arc;

use clausemap_core::{ClauseNode, ColumnRef, Join, OrderItem, Table};
use indexmap::IndexMap;

use super::{Mapper, MapperKey};
use crate::error::{OrmError, Result};
use crate::extension::MapperExtension;
use crate::instance::ClassId;
use crate::property::{equalities, owned_by, table_matches, ColumnProperty, MapperProperty, PropertyDef, SyncPair};
use crate::registry::Registry;

/// Starts a mapper of `class` onto `table`.
///
/// [`MapperBuilder::build`] resolves every relation whose target is already
/// mapped and fails on a bad join condition. A relation naming a class that
/// is mapped later resolves on first use; call [`Registry::configure`] once
/// every mapper is built to check those too.
///
/// ```rust
/// use clausemap_core::{ColumnDef, SqlType, Table};
/// use clausemap_orm::{mapper, ClassId, Registry};
///
/// const USER: ClassId = ClassId::new("User");
///
/// let users = Table::new(
///     "users",
///     vec![
///         ColumnDef::new("user_id", SqlType::Integer).primary_key(),
///         ColumnDef::new("user_name", SqlType::varchar(40)),
///     ],
/// );
/// let registry = Registry::new();
/// let m = mapper(USER, &users)
///     .property("name", users.c("user_name"))
///     .build(&registry)
///     .unwrap();
/// assert!(m.property("name").is_some());
/// assert!(m.property("user_id").is_some());
/// ```
#[must_use]
pub fn mapper(class: ClassId, table: impl Into<ClauseNode>) -> MapperBuilder {
    MapperBuilder {
        class,
        table: table.into(),
        primary_table: None,
        primary_key: Vec::new(),
        properties: Vec::new(),
        inherits: None,
        inherit_condition: None,
        extensions: Vec::new(),
        order_by: Vec::new(),
        primary: true,
    }
}

/// Configuration of a [`Mapper`], finished with [`MapperBuilder::build`].
#[derive(Debug)]
pub struct MapperBuilder {
    class: ClassId,
    table: ClauseNode,
    primary_table: Option<Table>,
    primary_key: Vec<ColumnRef>,
    properties: Vec<(String, PropertyDef)>,
    inherits: Option<Arc<Mapper>>,
    inherit_condition: Option<ClauseNode>,
    extensions: Vec<Arc<dyn MapperExtension>>,
    order_by: Vec<OrderItem>,
    primary: bool,
}

impl MapperBuilder {
    /// The table identity keys come from, when several are mapped.
    #[must_use]
    pub fn primary_table(mut self, table: &Table) -> Self {
        self.primary_table = Some(table.clone());
        self
    }

    /// Primary key columns, overriding the tables' own.
    #[must_use]
    pub fn primary_key(mut self, columns: impl IntoIterator<Item = ColumnRef>) -> Self {
        self.primary_key = columns.into_iter().collect();
        self
    }

    /// Declares a property. Declared names win over column names.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, prop: impl Into<PropertyDef>) -> Self {
        self.properties.push((key.into(), prop.into()));
        self
    }

    /// Inherits from `parent`: the mapped table becomes a join of the
    /// parent's table and this one.
    #[must_use]
    pub fn inherits(mut self, parent: &Arc<Mapper>) -> Self {
        self.inherits = Some(Arc::clone(parent));
        self
    }

    /// The join condition to the parent's table, when it cannot be inferred.
    #[must_use]
    pub fn inherit_condition(mut self, clause: impl Into<ClauseNode>) -> Self {
        self.inherit_condition = Some(clause.into());
        self
    }

    /// Adds an extension.
    #[must_use]
    pub fn extension(mut self, extension: impl MapperExtension + 'static) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Default ordering of selects.
    #[must_use]
    pub fn order_by<I, O>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderItem>,
    {
        self.order_by = items.into_iter().map(Into::into).collect();
        self
    }

    /// Keeps an existing primary mapper of the class in place.
    #[must_use]
    pub const fn non_primary(mut self) -> Self {
        self.primary = false;
        self
    }

    /// Builds the mapper, or returns the cached one for the same
    /// configuration.
    ///
    /// A relation that fails to resolve is reported here, but the mapper
    /// stays registered.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a table without a primary key, an
    /// ambiguous primary table or a relation with no usable join condition.
    pub fn build(self, registry: &Registry) -> Result<Arc<Mapper>> {
        if self.class.name().is_empty() {
            return Err(OrmError::config("a mapped class needs a name"));
        }
        let table: ClauseNode = match (&self.inherits, &self.inherit_condition) {
            (Some(parent), Some(on)) => {
                Join::new(parent.table().clone(), self.table.clone(), on.clone(), false).into()
            }
            (Some(parent), None) => Join::infer(parent.table().clone(), self.table.clone(), false)?.into(),
            (None, _) => self.table.clone(),
        };
        let key = MapperKey::new(self.class, table.clone(), self.fingerprint());
        let primary = self.primary;
        let build_key = key.clone();
        let mapper = registry.get_or_build(&key, primary, move || self.assemble(build_key, table))?;
        mapper.configure_mapped(registry)?;
        Ok(mapper)
    }

    fn fingerprint(&self) -> Vec<String> {
        let mut config = Vec::new();
        if let Some(table) = &self.primary_table {
            config.push(format!("primary_table={}", table.fullname()));
        }
        if !self.primary_key.is_empty() {
            let names: Vec<String> = self.primary_key.iter().map(ColumnRef::qualified_name).collect();
            config.push(format!("primary_key={}", names.join(",")));
        }
        for (key, prop) in &self.properties {
            config.push(format!("{key}={prop:?}"));
        }
        if let Some(parent) = &self.inherits {
            config.push(format!("inherits={:?}", parent.key()));
        }
        for extension in &self.extensions {
            config.push(format!("extension={}", extension.name()));
        }
        if !self.order_by.is_empty() {
            config.push(format!("order_by={:?}", self.order_by));
        }
        config
    }

    fn assemble(self, key: MapperKey, table: ClauseNode) -> Result<Mapper> {
        let class = self.class;
        let tables = sort_tables(table.tables());
        let primary_table = match (&self.primary_table, tables.as_slice(), &self.inherits) {
            (Some(explicit), _, _) => explicit.clone(),
            (None, [single], _) => single.clone(),
            (None, _, Some(parent)) => parent.primary_table().clone(),
            (None, [], None) => {
                return Err(OrmError::config(format!("mapper for {class} has no table")));
            }
            (None, many, None) => {
                return Err(OrmError::config(format!(
                    "mapper for {class} spans {} tables; set primary_table",
                    many.len()
                )));
            }
        };

        let mut pks_by_table = IndexMap::new();
        for t in &tables {
            let explicit: Vec<ColumnRef> = self
                .primary_key
                .iter()
                .filter(|c| owned_by(c, std::slice::from_ref(t)))
                .cloned()
                .collect();
            let pk = if explicit.is_empty() { t.primary_key() } else { explicit };
            if pk.is_empty() {
                return Err(OrmError::config(format!(
                    "table '{}' mapped by {class} has no primary key",
                    t.fullname()
                )));
            }
            pks_by_table.insert(t.clone(), pk);
        }
        let identity_columns = pks_by_table.get(&primary_table).cloned().ok_or_else(|| {
            OrmError::config(format!(
                "primary table '{}' is not mapped by {class}",
                primary_table.fullname()
            ))
        })?;

        let mut props: IndexMap<String, MapperProperty> = IndexMap::new();
        if let Some(parent) = &self.inherits {
            for (name, prop) in parent.properties() {
                props.insert(name.to_string(), prop.clone());
            }
        }
        for (name, def) in self.properties {
            props.insert(name, def.into());
        }
        for column in table.columns() {
            let covered = props.values().any(|prop| {
                prop.as_column()
                    .is_some_and(|c| c.columns().iter().any(|mapped| mapped.same_origin(&column)))
            });
            if covered {
                continue;
            }
            match props.get_mut(column.name()) {
                Some(MapperProperty::Column(prop)) => prop.push(column),
                Some(MapperProperty::Relation(_)) => {
                    return Err(OrmError::config(format!(
                        "column '{}' of {class} clashes with a relation of the same name",
                        column.qualified_name()
                    )));
                }
                None => {
                    props.insert(
                        column.name().to_string(),
                        MapperProperty::Column(ColumnProperty::new(vec![column])),
                    );
                }
            }
        }

        let mut column_to_property = HashMap::new();
        for (name, prop) in &props {
            if let Some(column) = prop.as_column() {
                for c in column.columns() {
                    column_to_property.insert(c.origin().clone(), name.clone());
                }
            }
        }

        let inherit_sync = match (&self.inherits, &table) {
            (Some(parent), ClauseNode::Join(join)) => equalities(join.on_clause())
                .into_iter()
                .map(|(left, right)| {
                    let (source, dest) = if owned_by(left, parent.tables()) {
                        (left, right)
                    } else {
                        (right, left)
                    };
                    SyncPair {
                        source: source.clone(),
                        dest: dest.clone(),
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Mapper {
            key,
            class,
            table,
            tables,
            primary_table,
            pks_by_table,
            identity_columns,
            props,
            column_to_property,
            extensions: self.extensions,
            order_by: self.order_by,
            inherits: self.inherits,
            inherit_sync,
        })
    }
}

// Referenced tables come before the tables whose foreign keys point at them.
fn sort_tables(mut pending: Vec<Table>) -> Vec<Table> {
    let mut sorted = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let index = pending
            .iter()
            .position(|t| {
                !t.foreign_keys().iter().any(|fk| {
                    pending
                        .iter()
                        .any(|other| other != t && table_matches(&other.fullname(), &fk.ref_table))
                })
            })
            .unwrap_or(0);
        sorted.push(pending.remove(index));
    }
    sorted
}
