//! Per-query mapper variants.
//!
//! [`Mapper::options`] derives a copy of a mapper with some relations
//! loaded differently or extra extensions attached. Copies are cached in
//! the registry under the original key plus the options, so asking twice
//! returns the same mapper.

use std::fmt;
use std::sync::Arc;

use super::Mapper;
use crate::error::Result;
use crate::extension::MapperExtension;
use crate::property::{LoadStrategy, MapperProperty};
use crate::registry::Registry;

/// A change applied by [`Mapper::options`].
#[derive(Clone)]
pub enum MapperOption {
    /// Join the relation into the parent's SELECT.
    EagerLoad(String),
    /// Load the relation on first access.
    LazyLoad(String),
    /// Never load the relation.
    NoLoad(String),
    /// Attach an extension.
    Extension(Arc<dyn MapperExtension>),
}

impl fmt::Debug for MapperOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

impl MapperOption {
    fn cache_key(&self) -> String {
        match self {
            Self::EagerLoad(key) => format!("eagerload:{key}"),
            Self::LazyLoad(key) => format!("lazyload:{key}"),
            Self::NoLoad(key) => format!("noload:{key}"),
            Self::Extension(ext) => format!("extension:{}", ext.name()),
        }
    }
}

/// Eager-load the relation `key`.
#[must_use]
pub fn eagerload(key: impl Into<String>) -> MapperOption {
    MapperOption::EagerLoad(key.into())
}

/// Lazy-load the relation `key`.
#[must_use]
pub fn lazyload(key: impl Into<String>) -> MapperOption {
    MapperOption::LazyLoad(key.into())
}

/// Never load the relation `key`.
#[must_use]
pub fn noload(key: impl Into<String>) -> MapperOption {
    MapperOption::NoLoad(key.into())
}

/// Attach `extension`.
#[must_use]
pub fn extension(extension: impl MapperExtension + 'static) -> MapperOption {
    MapperOption::Extension(Arc::new(extension))
}

impl Mapper {
    /// A copy of this mapper with `opts` applied, cached by configuration.
    ///
    /// ```rust
    /// use clausemap_core::{ColumnDef, SqlType, Table};
    /// use clausemap_orm::{eagerload, mapper, relation, ClassId, LoadStrategy, Registry};
    ///
    /// const USER: ClassId = ClassId::new("User");
    /// const ADDRESS: ClassId = ClassId::new("Address");
    ///
    /// let users = Table::new("users", vec![ColumnDef::new("user_id", SqlType::Integer).primary_key()]);
    /// let addresses = Table::new(
    ///     "addresses",
    ///     vec![
    ///         ColumnDef::new("address_id", SqlType::Integer).primary_key(),
    ///         ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
    ///     ],
    /// );
    /// let registry = Registry::new();
    /// let address = mapper(ADDRESS, &addresses).build(&registry).unwrap();
    /// let user = mapper(USER, &users)
    ///     .property("addresses", relation(&address))
    ///     .build(&registry)
    ///     .unwrap();
    ///
    /// let eager = user.options(&registry, [eagerload("addresses")]).unwrap();
    /// let again = user.options(&registry, [eagerload("addresses")]).unwrap();
    /// assert!(std::sync::Arc::ptr_eq(&eager, &again));
    /// assert_eq!(
    ///     eager.property("addresses").and_then(|p| p.as_relation()).map(|r| r.strategy()),
    ///     Some(LoadStrategy::Eager)
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// Fails when an option names a property this mapper does not have.
    pub fn options(
        self: &Arc<Self>,
        registry: &Registry,
        opts: impl IntoIterator<Item = MapperOption>,
    ) -> Result<Arc<Self>> {
        let opts: Vec<MapperOption> = opts.into_iter().collect();
        if opts.is_empty() {
            return Ok(Arc::clone(self));
        }
        let key = opts
            .iter()
            .fold(self.key.clone(), |key, opt| key.with_option(opt.cache_key()));
        let build_key = key.clone();
        registry.get_or_build(&key, false, move || {
            let mut copy = self.copy();
            copy.key = build_key;
            for opt in &opts {
                copy.apply(opt)?;
            }
            Ok(copy)
        })
    }

    fn apply(&mut self, opt: &MapperOption) -> Result<()> {
        let (key, strategy) = match opt {
            MapperOption::EagerLoad(key) => (key, LoadStrategy::Eager),
            MapperOption::LazyLoad(key) => (key, LoadStrategy::Lazy),
            MapperOption::NoLoad(key) => (key, LoadStrategy::NoLoad),
            MapperOption::Extension(ext) => {
                self.extensions.push(Arc::clone(ext));
                return Ok(());
            }
        };
        let relation = self.relation_property(key)?.with_strategy(strategy);
        self.props.insert(key.clone(), MapperProperty::Relation(relation));
        Ok(())
    }

    /// An independent copy. Relations are resolved again on first use.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            key: self.key.clone(),
            class: self.class,
            table: self.table.clone(),
            tables: self.tables.clone(),
            primary_table: self.primary_table.clone(),
            pks_by_table: self.pks_by_table.clone(),
            identity_columns: self.identity_columns.clone(),
            props: self.props.clone(),
            column_to_property: self.column_to_property.clone(),
            extensions: self.extensions.clone(),
            order_by: self.order_by.clone(),
            inherits: self.inherits.clone(),
            inherit_sync: self.inherit_sync.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Audit;

    impl MapperExtension for Audit {
        fn name(&self) -> &str {
            "audit"
        }
    }

    #[test]
    fn test_option_cache_keys() {
        assert_eq!(eagerload("addresses").cache_key(), "eagerload:addresses");
        assert_eq!(lazyload("orders").cache_key(), "lazyload:orders");
        assert_eq!(noload("items").cache_key(), "noload:items");
        assert_eq!(extension(Audit).cache_key(), "extension:audit");
    }
}
