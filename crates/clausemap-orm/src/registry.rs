//! The explicit context every mapper operation runs against.
//!
//! A [`Registry`] holds the mapper cache, the primary mapper of each class,
//! the compiled-statement cache and the scope provider. Build one at start
//! up and pass it by reference; nothing in this crate is global.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clausemap_core::{compile, ClauseNode, Compiled, Dialect, Params};
use tracing::{debug, trace};

use crate::config::OrmConfig;
use crate::error::{OrmError, Result};
use crate::instance::ClassId;
use crate::mapper::{Mapper, MapperKey};
use crate::scope::{Scope, ScopeProvider, ThreadScope};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatementKey {
    node: ClauseNode,
    params: Vec<String>,
    dialect: &'static str,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mapper and statement caches plus the unit-of-work scope.
#[derive(Debug)]
pub struct Registry {
    config: OrmConfig,
    scopes: Box<dyn ScopeProvider>,
    mappers: Mutex<HashMap<MapperKey, Arc<Mapper>>>,
    primary: Mutex<HashMap<ClassId, Arc<Mapper>>>,
    statements: Mutex<HashMap<StatementKey, Compiled>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry with default settings and per-thread scopes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(OrmConfig::default())
    }

    /// A registry with the given settings.
    #[must_use]
    pub fn with_config(config: OrmConfig) -> Self {
        Self {
            config,
            scopes: Box::new(ThreadScope::new()),
            mappers: Mutex::new(HashMap::new()),
            primary: Mutex::new(HashMap::new()),
            statements: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the scope provider.
    #[must_use]
    pub fn with_scope_provider(mut self, provider: impl ScopeProvider + 'static) -> Self {
        self.scopes = Box::new(provider);
        self
    }

    /// Settings.
    #[must_use]
    pub const fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// The current unit of work.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scopes.current_scope()
    }

    /// Discards the current unit of work.
    pub fn clear_scope(&self) {
        self.scopes.clear();
    }

    /// The primary mapper of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NoMapper`] when `class` has no primary mapper.
    pub fn class_mapper(&self, class: ClassId) -> Result<Arc<Mapper>> {
        lock(&self.primary)
            .get(&class)
            .cloned()
            .ok_or_else(|| OrmError::NoMapper(class.name().to_string()))
    }

    /// Every primary mapper.
    #[must_use]
    pub fn mappers(&self) -> Vec<Arc<Mapper>> {
        lock(&self.primary).values().cloned().collect()
    }

    /// Initializes every relation of every mapper, surfacing configuration
    /// errors before the first query.
    ///
    /// # Errors
    ///
    /// Returns the first relation that fails to resolve.
    pub fn configure(&self) -> Result<()> {
        let mappers: Vec<Arc<Mapper>> = lock(&self.mappers).values().cloned().collect();
        for mapper in mappers {
            mapper.configure(self)?;
        }
        Ok(())
    }

    /// Returns the mapper cached under `key`, building it on a miss.
    ///
    /// The cache stays locked while `build` runs, so concurrent first use
    /// of one key produces a single mapper.
    pub(crate) fn get_or_build(
        &self,
        key: &MapperKey,
        primary: bool,
        build: impl FnOnce() -> Result<Mapper>,
    ) -> Result<Arc<Mapper>> {
        let mut mappers = lock(&self.mappers);
        let mapper = match mappers.get(key) {
            Some(mapper) => {
                trace!(class = %key.class(), "Mapper cache hit");
                Arc::clone(mapper)
            }
            None => {
                let mapper = Arc::new(build()?);
                debug!(class = %key.class(), table = %mapper.table().from_id(), "Created mapper");
                mappers.insert(key.clone(), Arc::clone(&mapper));
                mapper
            }
        };
        let mut classes = lock(&self.primary);
        if primary {
            classes.insert(key.class(), Arc::clone(&mapper));
        } else {
            classes.entry(key.class()).or_insert_with(|| Arc::clone(&mapper));
        }
        Ok(mapper)
    }

    /// Compiles `node`, reusing an earlier compilation of an equal tree.
    ///
    /// # Errors
    ///
    /// Fails when `node` does not compile for `dialect`.
    pub fn compile(
        &self,
        node: &ClauseNode,
        dialect: &dyn Dialect,
        params: Option<&Params>,
    ) -> Result<Compiled> {
        let key = StatementKey {
            node: node.clone(),
            params: params
                .map(|p| p.keys().cloned().collect())
                .unwrap_or_default(),
            dialect: dialect.name(),
        };
        if let Some(compiled) = lock(&self.statements).get(&key) {
            trace!("Statement cache hit");
            return Ok(compiled.clone());
        }
        let compiled = compile(node, dialect, params)?;
        let mut statements = lock(&self.statements);
        if statements.len() >= self.config.statement_cache_size {
            debug!(size = statements.len(), "Clearing statement cache");
            statements.clear();
        }
        if self.config.statement_cache_size > 0 {
            statements.insert(key, compiled.clone());
        }
        Ok(compiled)
    }

    /// Number of cached compiled statements.
    #[must_use]
    pub fn statement_cache_len(&self) -> usize {
        lock(&self.statements).len()
    }
}

#[cfg(test)]
mod tests {
    use clausemap_core::{select, ColumnDef, GenericDialect, SqlType, Table};

    use super::*;

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
    fn test_statement_cache_reuses_equal_trees() {
        let registry = Registry::new();
        let users = users();
        let dialect = GenericDialect::new();
        let build = || ClauseNode::from(select([users.c("user_name")]).where_(users.c("user_id").eq(7)));

        let first = registry.compile(&build(), &dialect, None).unwrap();
        let second = registry.compile(&build(), &dialect, None).unwrap();
        assert_eq!(first.sql(), second.sql());
        assert_eq!(registry.statement_cache_len(), 1);

        let other = ClauseNode::from(select([users.c("user_id")]));
        registry.compile(&other, &dialect, None).unwrap();
        assert_eq!(registry.statement_cache_len(), 2);
    }

    #[test]
    fn test_statement_cache_is_cleared_when_full() {
        let config = OrmConfig {
            statement_cache_size: 1,
            ..OrmConfig::default()
        };
        let registry = Registry::with_config(config);
        let users = users();
        let dialect = GenericDialect::new();
        registry
            .compile(&select([users.c("user_id")]).into(), &dialect, None)
            .unwrap();
        registry
            .compile(&select([users.c("user_name")]).into(), &dialect, None)
            .unwrap();
        assert_eq!(registry.statement_cache_len(), 1);
    }

    #[test]
    fn test_unknown_class() {
        let registry = Registry::new();
        let err = registry.class_mapper(ClassId::new("Ghost")).unwrap_err();
        assert!(matches!(err, OrmError::NoMapper(name) if name == "Ghost"));
    }
}
