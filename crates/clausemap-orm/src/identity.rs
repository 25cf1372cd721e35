//! Identity keys and the identity map.

use std::collections::HashMap;
use std::fmt;

use clausemap_core::SqlValue;

use crate::instance::{ClassId, Instance};

/// `(class, primary table, primary key values)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    class: ClassId,
    table: String,
    values: Vec<SqlValue>,
}

impl IdentityKey {
    /// Builds a key.
    #[must_use]
    pub fn new(class: ClassId, table: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            class,
            table: table.into(),
            values,
        }
    }

    /// Mapped class.
    #[must_use]
    pub const fn class(&self) -> ClassId {
        self.class
    }

    /// Primary table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key values, in primary key column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(SqlValue::to_sql_inline).collect();
        write!(f, "{}[{}]({})", self.class, self.table, values.join(", "))
    }
}

/// At most one live instance per identity key.
#[derive(Debug, Default)]
pub struct IdentityMap {
    instances: HashMap<IdentityKey, Instance>,
}

impl IdentityMap {
    /// The instance for `key`.
    #[must_use]
    pub fn get(&self, key: &IdentityKey) -> Option<Instance> {
        self.instances.get(key).cloned()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.instances.contains_key(key)
    }

    /// Registers `instance` under `key`, replacing any previous entry.
    pub fn insert(&mut self, key: IdentityKey, instance: Instance) {
        self.instances.insert(key, instance);
    }

    /// Removes the entry for `key`.
    pub fn remove(&mut self, key: &IdentityKey) -> Option<Instance> {
        self.instances.remove(key)
    }

    /// Every tracked instance.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.instances.clear();
    }
}
