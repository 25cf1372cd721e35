//! Blocking SQLite engine.
//!
//! Wraps a single sqlx connection and a current-thread tokio runtime, so
//! callers get a synchronous [`Engine`].

use clausemap_core::{
    Dialect, Engine, EngineError, ForeignKey, ReflectedColumn, ResultSet, SqlValue, Table,
    TableReflection,
};
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, trace};

use crate::dialect::SqliteDialect;
use crate::error::Result;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A synchronous engine over one SQLite connection.
pub struct SqliteEngine {
    runtime: tokio::runtime::Runtime,
    conn: SqliteConnection,
    dialect: SqliteDialect,
    last_rowid: Option<i64>,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("last_rowid", &self.last_rowid)
            .finish_non_exhaustive()
    }
}

impl SqliteEngine {
    /// Connects to `url`, e.g. `sqlite://app.db` or `sqlite::memory:`.
    ///
    /// # Errors
    ///
    /// Fails when the URL is invalid or the database cannot be opened.
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let conn = runtime.block_on(SqliteConnection::connect(url))?;
        debug!(url = %url, "Connected to SQLite");
        Ok(Self {
            runtime,
            conn,
            dialect: SqliteDialect::new(),
            last_rowid: None,
        })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Fails when the database cannot be opened.
    pub fn memory() -> Result<Self> {
        Self::connect("sqlite::memory:")
    }

    fn run(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, value| bind_value(query, value));

        if returns_rows(sql) {
            let rows = self.runtime.block_on(query.fetch_all(&mut self.conn))?;
            let columns = rows
                .first()
                .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default();
            let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
            trace!(rows = rows.len(), "Fetched rows");
            Ok(ResultSet {
                columns,
                rows,
                rows_affected: 0,
            })
        } else {
            let done = self.runtime.block_on(query.execute(&mut self.conn))?;
            if sql.trim_start().to_ascii_uppercase().starts_with("INSERT") {
                self.last_rowid = Some(done.last_insert_rowid());
            }
            Ok(ResultSet {
                columns: Vec::new(),
                rows: Vec::new(),
                rows_affected: done.rows_affected(),
            })
        }
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_uppercase();
    head.starts_with("SELECT") || head.starts_with("PRAGMA") || head.starts_with("WITH")
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value.clone() {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
        SqlValue::Timestamp(ts) => query.bind(ts),
    }
}

// Values are decoded by their storage class, not the declared column type.
fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let storage = raw.type_info().name().to_string();
        let value = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
            "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
            "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
            _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
        };
        values.push(value);
    }
    Ok(values)
}

impl Engine for SqliteEngine {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> std::result::Result<ResultSet, EngineError> {
        Ok(self.run(sql, params)?)
    }

    fn last_inserted_ids(&self, table: &Table) -> Option<Vec<SqlValue>> {
        let pk = table.primary_key();
        match (pk.as_slice(), self.last_rowid) {
            ([_single], Some(rowid)) => Some(vec![SqlValue::Int(rowid)]),
            _ => None,
        }
    }

    fn begin(&mut self) -> std::result::Result<(), EngineError> {
        debug!("BEGIN");
        self.run("BEGIN", &[])?;
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), EngineError> {
        debug!("COMMIT");
        self.run("COMMIT", &[])?;
        Ok(())
    }

    fn rollback(&mut self) -> std::result::Result<(), EngineError> {
        debug!("ROLLBACK");
        self.run("ROLLBACK", &[])?;
        Ok(())
    }
}

impl TableReflection for SqliteEngine {
    fn reflect_table(
        &mut self,
        table: &str,
    ) -> std::result::Result<(Vec<ReflectedColumn>, Vec<ForeignKey>), EngineError> {
        let info = self.run(&format!("PRAGMA table_info({table})"), &[])?;
        let columns = info
            .rows
            .iter()
            .filter_map(|row| {
                let name = row.get(1)?.as_str()?.to_string();
                let declared = row.get(2).and_then(SqlValue::as_str).unwrap_or("");
                Some(ReflectedColumn {
                    name,
                    ty: SqliteDialect::parse_type(declared),
                    nullable: row.get(3).and_then(SqlValue::as_i64) == Some(0),
                    primary_key: row.get(5).and_then(SqlValue::as_i64).unwrap_or(0) > 0,
                })
            })
            .collect();

        let fks = self.run(&format!("PRAGMA foreign_key_list({table})"), &[])?;
        let foreign_keys = fks
            .rows
            .iter()
            .filter_map(|row| {
                Some(ForeignKey {
                    ref_table: row.get(2)?.as_str()?.to_string(),
                    column: row.get(3)?.as_str()?.to_string(),
                    ref_column: row.get(4)?.as_str()?.to_string(),
                })
            })
            .collect();

        Ok((columns, foreign_keys))
    }
}
