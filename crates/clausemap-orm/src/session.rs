//! The handle applications work through.
//!
//! A [`Session`] ties a [`Registry`] to an [`Engine`] and a unit of work.
//! Queries run through a mapper with the session passed in; changes to
//! instances are written by [`Session::flush`].

use std::sync::Arc;

use clausemap_core::{ClauseNode, Compiled, Engine, Params, ResultSet};
use tracing::{debug, info};

use crate::error::Result;
use crate::flush::UowTransaction;
use crate::instance::{ClassId, DeferredLoad, Instance, Related, RelatedState};
use crate::mapper::{Mapper, SelectOptions};
use crate::property::LoadStrategy;
use crate::registry::Registry;
use crate::scope::Scope;

/// A registry, an engine and the unit of work they share.
pub struct Session<'r, E: Engine> {
    registry: &'r Registry,
    engine: E,
    scope: Scope,
}

impl<E: Engine> std::fmt::Debug for Session<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let uow = self.scope.borrow();
        f.debug_struct("Session")
            .field("identity_map", &uow.identity_map().len())
            .field("new", &uow.new_instances().len())
            .field("deleted", &uow.deleted_instances().len())
            .finish_non_exhaustive()
    }
}

impl<'r, E: Engine> Session<'r, E> {
    /// A session on the registry's current unit of work.
    pub fn new(registry: &'r Registry, engine: E) -> Self {
        let scope = registry.scope();
        Self::with_scope(registry, engine, scope)
    }

    /// A session on an explicit unit of work.
    pub const fn with_scope(registry: &'r Registry, engine: E, scope: Scope) -> Self {
        Self {
            registry,
            engine,
            scope,
        }
    }

    /// The registry.
    #[must_use]
    pub const fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// The engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// The engine, mutably.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The unit of work.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Gives the engine back.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// The primary mapper of `class`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NoMapper`] when `class` has no primary mapper.
    pub fn mapper(&self, class: ClassId) -> Result<Arc<Mapper>> {
        self.registry.class_mapper(class)
    }

    /// Compiles and executes a statement.
    ///
    /// # Errors
    ///
    /// Fails when the statement does not compile or the engine rejects it.
    pub fn execute(&mut self, node: impl Into<ClauseNode>, params: &Params) -> Result<ResultSet> {
        let (result, _) = self.run(&node.into(), params)?;
        Ok(result)
    }

    pub(crate) fn run(&mut self, node: &ClauseNode, params: &Params) -> Result<(ResultSet, Compiled)> {
        let compiled = self.registry.compile(node, self.engine.dialect(), Some(params))?;
        let values = compiled.params_for(self.engine.dialect(), params);
        if self.registry.config().echo {
            info!(sql = %compiled.sql(), params = ?values, "Executing SQL");
        } else {
            debug!(sql = %compiled.sql(), params = ?values, "Executing SQL");
        }
        let result = self.engine.execute(compiled.sql(), &values)?;
        Ok((result, compiled))
    }

    /// A new object of `class`, already pending INSERT.
    #[must_use]
    pub fn new_tracked(&self, class: ClassId) -> Instance {
        let instance = Instance::new(class);
        self.scope.borrow_mut().register_new(&instance);
        instance
    }

    /// Schedules a transient object for INSERT. Persistent objects are
    /// tracked already.
    pub fn save(&self, instance: &Instance) {
        self.scope.borrow_mut().register_new(instance);
    }

    /// Schedules an object for DELETE.
    pub fn delete(&self, instance: &Instance) {
        self.scope.borrow_mut().register_deleted(instance);
    }

    /// Stops tracking an object.
    pub fn evict(&self, instance: &Instance) {
        self.scope.borrow_mut().evict(instance);
    }

    /// Forgets every tracked object.
    pub fn clear(&self) {
        self.scope.borrow_mut().clear();
    }

    /// The value of the relation `key`, loading it if needed.
    ///
    /// # Errors
    ///
    /// Fails when `key` is not a relation of the instance's mapper or the
    /// load fails.
    pub fn related(&mut self, instance: &Instance, key: &str) -> Result<Related> {
        match instance.related_state(key) {
            RelatedState::Loaded(related) => Ok(related),
            RelatedState::Deferred(load) => {
                let related = self.load_deferred(&load)?;
                instance.set_related_committed(key, related.clone());
                Ok(related)
            }
            RelatedState::Missing => {
                let mapper = self.registry.class_mapper(instance.class())?;
                let relation = mapper.relation_property(key)?;
                let state = relation.state(key, &mapper, self.registry)?;
                if !instance.is_persistent() || relation.strategy() == LoadStrategy::NoLoad {
                    let empty = Related::empty(state.uselist());
                    instance.set_related_committed(key, empty.clone());
                    return Ok(empty);
                }
                state.defer(key, instance, state.lazy_params(&mapper, instance));
                self.related(instance, key)
            }
        }
    }

    fn load_deferred(&mut self, load: &DeferredLoad) -> Result<Related> {
        debug!(class = %load.target.class(), "Loading deferred relation");
        let target = Arc::clone(&load.target);
        let instances = target.query(self, Some(load.clause.clone()), &load.params, &SelectOptions::default())?;
        Ok(if load.uselist {
            Related::Many(instances)
        } else {
            Related::One(instances.into_iter().next())
        })
    }

    /// Replaces the value of the relation `key`.
    ///
    /// # Errors
    ///
    /// Fails when `key` is not a relation of the instance's mapper.
    pub fn set_related(&mut self, instance: &Instance, key: &str, related: Related) -> Result<()> {
        self.related(instance, key)?;
        instance.set_related(key, related);
        Ok(())
    }

    /// Adds `child` to the relation `key`; a scalar relation is replaced.
    ///
    /// # Errors
    ///
    /// Fails when `key` is not a relation of the instance's mapper.
    pub fn append_related(&mut self, instance: &Instance, key: &str, child: &Instance) -> Result<()> {
        let related = match self.related(instance, key)? {
            Related::Many(mut items) => {
                if !items.contains(child) {
                    items.push(child.clone());
                }
                Related::Many(items)
            }
            Related::One(_) => Related::One(Some(child.clone())),
        };
        instance.set_related(key, related);
        Ok(())
    }

    /// Removes `child` from the relation `key`.
    ///
    /// # Errors
    ///
    /// Fails when `key` is not a relation of the instance's mapper.
    pub fn remove_related(&mut self, instance: &Instance, key: &str, child: &Instance) -> Result<()> {
        let related = match self.related(instance, key)? {
            Related::Many(mut items) => {
                items.retain(|item| item != child);
                Related::Many(items)
            }
            Related::One(Some(current)) if current == *child => Related::One(None),
            other => other,
        };
        instance.set_related(key, related);
        Ok(())
    }

    /// Writes every pending change in dependency order, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns the first failed statement, after rolling back, or
    /// [`OrmError::Concurrency`] when an UPDATE or DELETE matches an
    /// unexpected number of rows.
    pub fn flush(&mut self) -> Result<()> {
        UowTransaction::new(self)?.execute(self)
    }
}
