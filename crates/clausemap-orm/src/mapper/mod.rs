//! Class-to-table mappers.
//!
//! A [`Mapper`] binds a [`ClassId`] to a table (or a join of tables for an
//! inheriting class) and owns the properties that move values between
//! result rows and [`Instance`] attributes. Mappers are built once per
//! configuration through [`mapper`] and cached in the [`Registry`].

mod builder;
mod options;
mod query;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use clausemap_core::{ClauseNode, ColumnIdent, ColumnRef, OrderItem, Select, SqlValue, Table, ToSqlValue};
use indexmap::IndexMap;

pub use builder::{mapper, MapperBuilder};
pub use options::{eagerload, extension, lazyload, noload, MapperOption};
pub use query::SelectOptions;

use crate::error::{OrmError, Result};
use crate::extension::MapperExtension;
use crate::identity::IdentityKey;
use crate::instance::{ClassId, Instance};
use crate::loading::{LoadContext, RowView, SetupContext, TableAdapter};
use crate::property::{MapperProperty, Relation, RelationState, RelationTarget, SyncPair};
use crate::registry::Registry;

/// Cache key of a mapper: its class, its table and a fingerprint of
/// everything else that shapes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapperKey {
    class: ClassId,
    table: ClauseNode,
    config: Vec<String>,
}

impl MapperKey {
    pub(crate) fn new(class: ClassId, table: ClauseNode, config: Vec<String>) -> Self {
        Self { class, table, config }
    }

    /// The mapped class.
    #[must_use]
    pub const fn class(&self) -> ClassId {
        self.class
    }

    pub(crate) fn with_option(&self, option: String) -> Self {
        let mut key = self.clone();
        key.config.push(option);
        key
    }
}

/// Maps rows of a table to instances of a class.
pub struct Mapper {
    key: MapperKey,
    class: ClassId,
    table: ClauseNode,
    tables: Vec<Table>,
    primary_table: Table,
    pks_by_table: IndexMap<Table, Vec<ColumnRef>>,
    identity_columns: Vec<ColumnRef>,
    props: IndexMap<String, MapperProperty>,
    column_to_property: HashMap<ColumnIdent, String>,
    extensions: Vec<Arc<dyn MapperExtension>>,
    order_by: Vec<OrderItem>,
    inherits: Option<Arc<Mapper>>,
    inherit_sync: Vec<SyncPair>,
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("class", &self.class)
            .field("table", &self.table.from_id())
            .field("properties", &self.props.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Mapper {
    /// The cache key.
    #[must_use]
    pub const fn key(&self) -> &MapperKey {
        &self.key
    }

    /// The mapped class.
    #[must_use]
    pub const fn class(&self) -> ClassId {
        self.class
    }

    /// The mapped selectable.
    #[must_use]
    pub const fn table(&self) -> &ClauseNode {
        &self.table
    }

    /// Every table written by this mapper, referenced tables first.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// The table identity keys are taken from.
    #[must_use]
    pub const fn primary_table(&self) -> &Table {
        &self.primary_table
    }

    /// Columns whose values form the identity key.
    #[must_use]
    pub fn primary_key(&self) -> &[ColumnRef] {
        &self.identity_columns
    }

    /// Primary key columns of one of the mapper's tables.
    #[must_use]
    pub fn table_primary_key(&self, table: &Table) -> &[ColumnRef] {
        self.pks_by_table.get(table).map_or(&[], Vec::as_slice)
    }

    /// The mapper this one inherits from.
    #[must_use]
    pub const fn inherits(&self) -> Option<&Arc<Mapper>> {
        self.inherits.as_ref()
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &MapperProperty)> {
        self.props.iter().map(|(key, prop)| (key.as_str(), prop))
    }

    /// The property named `key`.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&MapperProperty> {
        self.props.get(key)
    }

    /// Registered extensions, in order.
    #[must_use]
    pub fn extensions(&self) -> &[Arc<dyn MapperExtension>] {
        &self.extensions
    }

    /// The attribute a column is mapped to.
    #[must_use]
    pub fn property_for_column(&self, column: &ColumnRef) -> Option<&str> {
        self.column_to_property.get(column.origin()).map(String::as_str)
    }

    /// Resolves the relation `key`.
    ///
    /// # Errors
    ///
    /// Fails when `key` is not a relation or its join cannot be resolved.
    pub fn relation(&self, registry: &Registry, key: &str) -> Result<&RelationState> {
        self.relation_property(key)?.state(key, self, registry)
    }

    pub(crate) fn relation_property(&self, key: &str) -> Result<&Relation> {
        self.props
            .get(key)
            .and_then(MapperProperty::as_relation)
            .ok_or_else(|| OrmError::UnknownProperty {
                class: self.class.name().to_string(),
                key: key.to_string(),
            })
    }

    pub(crate) fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.props
            .iter()
            .filter_map(|(key, prop)| prop.as_relation().map(|rel| (key.as_str(), rel)))
    }

    /// Resolves every relation, reporting configuration errors early.
    ///
    /// # Errors
    ///
    /// Returns the first relation that fails to resolve.
    pub fn configure(&self, registry: &Registry) -> Result<()> {
        for (key, relation) in self.relations() {
            relation.state(key, self, registry)?;
        }
        Ok(())
    }

    // Relations to a class with no mapper yet resolve on first use.
    pub(crate) fn configure_mapped(&self, registry: &Registry) -> Result<()> {
        for (key, relation) in self.relations() {
            let mapped = match relation.def().target() {
                RelationTarget::Mapper(_) => true,
                RelationTarget::Class(class) => registry.class_mapper(*class).is_ok(),
            };
            if mapped {
                relation.state(key, self, registry)?;
            }
        }
        Ok(())
    }

    /// Current value of the attribute mapped to `column`.
    #[must_use]
    pub fn column_value(&self, instance: &Instance, column: &ColumnRef) -> Option<SqlValue> {
        self.property_for_column(column).and_then(|key| instance.get(key))
    }

    /// Committed value of the attribute mapped to `column`.
    #[must_use]
    pub fn committed_column_value(&self, instance: &Instance, column: &ColumnRef) -> Option<SqlValue> {
        self.property_for_column(column)
            .and_then(|key| instance.committed(key))
    }

    /// Sets the attribute mapped to `column`. Returns whether one exists.
    pub fn set_column_value(&self, instance: &Instance, column: &ColumnRef, value: impl ToSqlValue) -> bool {
        match self.property_for_column(column) {
            Some(key) => {
                instance.set(key, value);
                true
            }
            None => false,
        }
    }

    /// The identity key for primary key `values`.
    #[must_use]
    pub fn identity_key(&self, values: Vec<SqlValue>) -> IdentityKey {
        IdentityKey::new(self.class, self.primary_table.fullname(), values)
    }

    /// The identity key an instance has or would have; `None` while any
    /// primary key attribute is unset or null.
    #[must_use]
    pub fn instance_key(&self, instance: &Instance) -> Option<IdentityKey> {
        let values = self
            .identity_columns
            .iter()
            .map(|column| self.column_value(instance, column).filter(|v| !v.is_null()))
            .collect::<Option<Vec<_>>>()?;
        Some(self.identity_key(values))
    }

    pub(crate) fn inherit_sync(&self) -> &[SyncPair] {
        &self.inherit_sync
    }

    /// Sort keys used when a select names none.
    pub(crate) fn default_order(&self, registry: &Registry) -> Vec<OrderItem> {
        if !self.order_by.is_empty() {
            return self.order_by.clone();
        }
        if registry.config().order_by_primary_key {
            return self
                .table_primary_key(&self.primary_table)
                .iter()
                .cloned()
                .map(OrderItem::from)
                .collect();
        }
        Vec::new()
    }

    pub(crate) fn has_eager(&self) -> bool {
        self.relations()
            .any(|(_, rel)| rel.strategy() == crate::property::LoadStrategy::Eager)
    }

    /// Runs the eager setup of every relation.
    pub(crate) fn setup_eager(
        &self,
        stmt: &mut Select,
        ctx: &mut SetupContext<'_>,
        adapter: &TableAdapter,
        path: &str,
    ) -> Result<()> {
        for (key, relation) in self.relations() {
            relation.setup(key, self, stmt, ctx, adapter, path)?;
        }
        Ok(())
    }

    /// Turns a row into an instance.
    ///
    /// Returns `None` when the row's primary key has a null, which is how
    /// an outer join reports a missing related row. The flag is `true` the
    /// first time an instance is met in this result.
    pub(crate) fn instance(
        &self,
        view: RowView<'_, '_>,
        load: &mut LoadContext<'_>,
    ) -> Result<Option<(Instance, bool)>> {
        let mut values = Vec::with_capacity(self.identity_columns.len());
        for column in &self.identity_columns {
            match view.get(column) {
                Some(value) if !value.is_null() => values.push(value),
                _ => return Ok(None),
            }
        }
        let key = self.identity_key(values);

        if let Some((instance, populating)) = load.seen.get(&key).cloned() {
            if populating {
                self.populate(&instance, view, load, false)?;
            }
            return Ok(Some((instance, false)));
        }

        let existing = load.scope.borrow().get(&key);
        let (instance, populating) = match existing {
            Some(instance) => (instance, load.populate_existing),
            None => {
                let instance = self
                    .extensions
                    .iter()
                    .find_map(|ext| ext.create_instance(self, view.row))
                    .unwrap_or_else(|| Instance::new(self.class));
                instance.set_identity_key(Some(key.clone()));
                load.scope.borrow_mut().register_clean(key.clone(), &instance);
                (instance, true)
            }
        };
        load.seen.insert(key, (instance.clone(), populating));
        if populating {
            self.populate(&instance, view, load, true)?;
        }
        Ok(Some((instance, true)))
    }

    fn populate(
        &self,
        instance: &Instance,
        view: RowView<'_, '_>,
        load: &mut LoadContext<'_>,
        first: bool,
    ) -> Result<()> {
        for (key, prop) in &self.props {
            match prop {
                MapperProperty::Column(column) => {
                    if first {
                        column.execute(key, instance, view.row, view.adapter);
                    }
                }
                MapperProperty::Relation(relation) => {
                    relation.execute(key, self, instance, view, load, first)?;
                }
            }
        }
        Ok(())
    }

    /// Whether every extension accepts `instance` into `result`.
    pub(crate) fn append_result(&self, instance: &Instance, result: &mut Vec<Instance>) -> bool {
        self.extensions
            .iter()
            .all(|ext| ext.append_result(self, instance, result))
    }
}
