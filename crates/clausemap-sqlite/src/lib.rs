//! # clausemap-sqlite
//!
//! SQLite support for `clausemap-core`.
//!
//! # How SQLite differs from other dialects
//!
//! - **[Type affinity]**: any column can store any value. Rows are decoded
//!   by storage class and then coerced by [`SqliteDialect`] using the
//!   declared column type (booleans come back as integers, timestamps as
//!   text).
//! - **OFFSET without LIMIT** is not accepted; the dialect renders
//!   `LIMIT -1 OFFSET n`.
//! - **Generated keys**: a single INTEGER primary key aliases the rowid,
//!   which [`SqliteEngine`] reports after each INSERT.
//!
//! [Type affinity]: https://www.sqlite.org/datatype3.html
//!
//! ## Example
//!
//! ```rust
//! use clausemap_core::{execute, params, ColumnDef, Engine, SqlType, Table};
//! use clausemap_sqlite::SqliteEngine;
//!
//! let mut engine = SqliteEngine::memory().unwrap();
//! let users = Table::new(
//!     "users",
//!     vec![
//!         ColumnDef::new("user_id", SqlType::Integer).primary_key(),
//!         ColumnDef::new("user_name", SqlType::varchar(40)),
//!     ],
//! );
//! users.create(&mut engine).unwrap();
//! execute(&mut engine, &users.insert().into(), &params([("user_name", "jack")])).unwrap();
//! assert_eq!(
//!     engine.last_inserted_ids(&users),
//!     Some(vec![clausemap_core::SqlValue::Int(1)])
//! );
//! ```

mod dialect;
mod engine;
mod error;

pub use dialect::SqliteDialect;
pub use engine::SqliteEngine;
pub use error::{Result, SqliteError};
