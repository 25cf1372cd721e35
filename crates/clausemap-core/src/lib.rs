//! # clausemap-core
//!
//! Composable SQL clause trees and a dialect-independent compiler.
//!
//! Tables, columns, criteria and statements are values of one tree type,
//! [`ClauseNode`]. Trees are immutable once built, compare structurally and
//! compile into SQL text plus an ordered list of bind names:
//!
//! ```rust
//! use clausemap_core::{select, ColumnDef, GenericDialect, SqlType, Table};
//!
//! let users = Table::new(
//!     "users",
//!     vec![
//!         ColumnDef::new("user_id", SqlType::Integer).primary_key(),
//!         ColumnDef::new("user_name", SqlType::varchar(40)),
//!     ],
//! );
//!
//! let stmt = select([users.c("user_name")]).where_(users.c("user_id").eq(7));
//! let compiled = stmt.compile(&GenericDialect::new()).unwrap();
//! assert_eq!(
//!     compiled.sql(),
//!     "SELECT users.user_name FROM users WHERE users.user_id = ?"
//! );
//! assert_eq!(compiled.bind_names().to_vec(), vec!["users_user_id".to_string()]);
//! ```
//!
//! FROM lists are derived from the columns and criteria of a statement.
//! Subqueries in the WHERE clause are correlated against the enclosing
//! statement, and joins hide the tables they are built from.

pub mod clause;
pub mod compiler;
pub mod ddl;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod schema;
pub mod types;
pub mod value;

pub use clause::{
    alias, and_, asc, bindparam, delete, desc, exists, insert, join, literal, not_, null, or_,
    outerjoin, select, text, update, Alias, Binary, BindParam, ClauseNode, Compound, CompoundOp,
    Delete, FromEntry, Insert, IntoOperand, Join, Operand, Operator, OrderItem, Select, SetOp,
    TableFinder, TextClause, Unary, UnaryOp, Update, Visitor,
};
pub use compiler::{compile, Compiled};
pub use ddl::{create_table_sql, drop_table_sql};
pub use dialect::{Dialect, GenericDialect, ParamStyle};
pub use engine::{execute, Engine, ResultSet};
pub use error::{CompileError, EngineError, Result};
pub use schema::{
    ColumnDef, ColumnIdent, ColumnOwner, ColumnRef, ForeignKey, ReflectedColumn, Sequence, Table,
    TableReflection,
};
pub use types::SqlType;
pub use value::{params, FromSqlValue, Params, SqlValue, ToSqlValue};
