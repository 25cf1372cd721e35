#![allow(dead_code)]

use std::sync::Arc;

use clausemap_core::{ColumnDef, Dialect, Engine, EngineError, ResultSet, SqlType, SqlValue, Table};
use clausemap_orm::{mapper, relation, ClassId, Mapper, Registry, Session};
use clausemap_sqlite::SqliteEngine;

pub const USER: ClassId = ClassId::new("User");
pub const ADDRESS: ClassId = ClassId::new("Address");
pub const ORDER: ClassId = ClassId::new("Order");
pub const ITEM: ClassId = ClassId::new("Item");
pub const KEYWORD: ClassId = ClassId::new("Keyword");

/// SQLite engine that remembers every statement it ran.
#[derive(Debug)]
pub struct RecordingEngine {
    inner: SqliteEngine,
    pub log: Vec<String>,
}

impl RecordingEngine {
    pub fn statements(&self) -> &[String] {
        &self.log
    }

    /// Statements starting with `prefix`, e.g. `"INSERT INTO addresses"`.
    pub fn matching(&self, prefix: &str) -> Vec<&String> {
        self.log.iter().filter(|sql| sql.starts_with(prefix)).collect()
    }

    /// Index of the first statement starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.log.iter().position(|sql| sql.starts_with(prefix))
    }
}

impl Engine for RecordingEngine {
    fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect()
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, EngineError> {
        self.log.push(sql.to_string());
        self.inner.execute(sql, params)
    }

    fn last_inserted_ids(&self, table: &Table) -> Option<Vec<SqlValue>> {
        self.inner.last_inserted_ids(table)
    }

    fn begin(&mut self) -> Result<(), EngineError> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), EngineError> {
        self.inner.rollback()
    }
}

/// The users/addresses/orders/items/keywords schema.
pub struct Schema {
    pub users: Table,
    pub addresses: Table,
    pub orders: Table,
    pub items: Table,
    pub keywords: Table,
    pub itemkeywords: Table,
}

impl Schema {
    pub fn new() -> Self {
        Self {
            users: Table::new(
                "users",
                vec![
                    ColumnDef::new("user_id", SqlType::Integer).primary_key(),
                    ColumnDef::new("user_name", SqlType::varchar(40)).not_null(),
                ],
            ),
            addresses: Table::new(
                "email_addresses",
                vec![
                    ColumnDef::new("address_id", SqlType::Integer).primary_key(),
                    ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
                    ColumnDef::new("email_address", SqlType::varchar(40)),
                ],
            ),
            orders: Table::new(
                "orders",
                vec![
                    ColumnDef::new("order_id", SqlType::Integer).primary_key(),
                    ColumnDef::new("user_id", SqlType::Integer).references("users.user_id"),
                    ColumnDef::new("description", SqlType::varchar(50)),
                ],
            ),
            items: Table::new(
                "items",
                vec![
                    ColumnDef::new("item_id", SqlType::Integer).primary_key(),
                    ColumnDef::new("order_id", SqlType::Integer).references("orders.order_id"),
                    ColumnDef::new("item_name", SqlType::varchar(50)),
                ],
            ),
            keywords: Table::new(
                "keywords",
                vec![
                    ColumnDef::new("keyword_id", SqlType::Integer).primary_key(),
                    ColumnDef::new("name", SqlType::varchar(50)),
                ],
            ),
            itemkeywords: Table::new(
                "itemkeywords",
                vec![
                    ColumnDef::new("item_id", SqlType::Integer).references("items.item_id"),
                    ColumnDef::new("keyword_id", SqlType::Integer).references("keywords.keyword_id"),
                ],
            ),
        }
    }

    pub fn tables(&self) -> Vec<&Table> {
        vec![
            &self.users,
            &self.addresses,
            &self.orders,
            &self.items,
            &self.keywords,
            &self.itemkeywords,
        ]
    }

    /// A fresh in-memory database with every table created.
    pub fn engine(&self) -> RecordingEngine {
        init_tracing();
        let mut engine = RecordingEngine {
            inner: SqliteEngine::memory().unwrap(),
            log: Vec::new(),
        };
        for table in self.tables() {
            table.create(&mut engine).unwrap();
        }
        engine.log.clear();
        engine
    }
}

/// User, Address and Order mappers; `addresses` and `orders` are lazy.
pub struct Mappers {
    pub user: Arc<Mapper>,
    pub address: Arc<Mapper>,
    pub order: Arc<Mapper>,
}

pub fn user_mappers(schema: &Schema, registry: &Registry) -> Mappers {
    let address = mapper(ADDRESS, &schema.addresses).build(registry).unwrap();
    let order = mapper(ORDER, &schema.orders).build(registry).unwrap();
    let user = mapper(USER, &schema.users)
        .property("addresses", relation(&address))
        .property("orders", relation(&order))
        .build(registry)
        .unwrap();
    Mappers { user, address, order }
}

/// Inserts jack (addresses jack@bean, jack@home; one order) and ed (no
/// addresses) through plain SQL.
pub fn seed(session: &mut Session<'_, RecordingEngine>) {
    for sql in [
        "INSERT INTO users (user_id, user_name) VALUES (7, 'jack')",
        "INSERT INTO users (user_id, user_name) VALUES (8, 'ed')",
        "INSERT INTO email_addresses (address_id, user_id, email_address) VALUES (1, 7, 'jack@bean.com')",
        "INSERT INTO email_addresses (address_id, user_id, email_address) VALUES (2, 7, 'jack@home.com')",
        "INSERT INTO orders (order_id, user_id, description) VALUES (1, 7, 'order 1')",
    ] {
        session.engine_mut().execute(sql, &[]).unwrap();
    }
    session.engine_mut().log.clear();
}

/// Routes ORM logs to the test output, visible with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}
