//! # clausemap-orm
//!
//! A data mapper over `clausemap-core` clause trees.
//!
//! This crate provides:
//! - [`Mapper`] binding a class to a table, a join or an inheritance chain
//! - relations with lazy, eager (outer join) and no-load strategies
//! - an [`IdentityMap`] so each row is one [`Instance`] per scope
//! - a [`UnitOfWork`] whose flush writes rows in foreign key order
//!
//! ## Quick Start
//!
//! ```ignore
//! use clausemap_core::{ColumnDef, SqlType, Table};
//! use clausemap_orm::{mapper, relation, ClassId, Registry, Session};
//! use clausemap_sqlite::SqliteEngine;
//!
//! const USER: ClassId = ClassId::new("User");
//! const ADDRESS: ClassId = ClassId::new("Address");
//!
//! let registry = Registry::new();
//! let address = mapper(ADDRESS, &addresses).build(&registry)?;
//! let user = mapper(USER, &users)
//!     .property("addresses", relation(&address).private())
//!     .build(&registry)?;
//!
//! let mut session = Session::new(&registry, SqliteEngine::memory()?);
//! let jack = session.new_tracked(USER);
//! jack.set("user_name", "jack");
//! let home = Instance::new(ADDRESS);
//! home.set("email_address", "jack@home");
//! session.append_related(&jack, "addresses", &home)?;
//! session.flush()?;
//!
//! // Same row, same object.
//! let again = user.get(&mut session, &[jack.get("user_id").unwrap()])?;
//! assert_eq!(again, Some(jack));
//! ```
//!
//! ## Loading strategies
//!
//! ```ignore
//! use clausemap_orm::{eagerload, SelectOptions};
//!
//! // Addresses come back in the same SELECT, through a LEFT OUTER JOIN.
//! let eager = user.options(&registry, [eagerload("addresses")])?;
//! let users = eager.select_with(&mut session, None, &SelectOptions::new().limit(10))?;
//! ```

mod config;
mod error;
mod extension;
mod flush;
mod identity;
mod instance;
mod loading;
mod macros;
mod mapper;
mod property;
mod registry;
mod scope;
mod session;
mod unitofwork;

pub use config::OrmConfig;
pub use error::{OrmError, Result};
pub use extension::MapperExtension;
pub use identity::{IdentityKey, IdentityMap};
pub use instance::{ClassId, History, Instance, Related};
pub use loading::Row;
pub use mapper::{
    eagerload, extension, lazyload, mapper, noload, Mapper, MapperBuilder, MapperKey, MapperOption, SelectOptions,
};
pub use property::{
    relation, ColumnProperty, Direction, LoadStrategy, MapperProperty, PropertyDef, Relation, RelationDef,
    RelationState, RelationTarget,
};
pub use registry::Registry;
pub use scope::{Scope, ScopeProvider, ThreadScope};
pub use session::Session;
pub use unitofwork::UnitOfWork;
