//! SQLite dialect implementation.

use chrono::NaiveDateTime;
use clausemap_core::{Dialect, SqlType, SqlValue};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// SQLite dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Maps a declared column type back to a [`SqlType`].
    #[must_use]
    pub fn parse_type(declared: &str) -> SqlType {
        let upper = declared.trim().to_ascii_uppercase();
        let (base, args) = match upper.split_once('(') {
            Some((base, rest)) => (base.trim().to_string(), rest.trim_end_matches(')').to_string()),
            None => (upper.clone(), String::new()),
        };
        let numbers: Vec<u32> = args
            .split(',')
            .filter_map(|n| n.trim().parse().ok())
            .collect();
        match base.as_str() {
            "INTEGER" | "INT" | "BIGINT" | "SMALLINT" => SqlType::Integer,
            "VARCHAR" | "CHAR" | "NVARCHAR" => SqlType::String(numbers.first().copied()),
            "NUMERIC" | "DECIMAL" => SqlType::Numeric {
                precision: numbers.first().and_then(|n| u8::try_from(*n).ok()).unwrap_or(10),
                scale: numbers.get(1).and_then(|n| u8::try_from(*n).ok()).unwrap_or(0),
            },
            "REAL" | "FLOAT" | "DOUBLE" => SqlType::Float,
            "TIMESTAMP" | "DATETIME" => SqlType::DateTime,
            "BLOB" => SqlType::Binary,
            "BOOLEAN" | "BOOL" => SqlType::Boolean,
            _ => SqlType::Text,
        }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn render_type(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::Float => String::from("REAL"),
            SqlType::Numeric { precision, scale } => format!("NUMERIC({precision}, {scale})"),
            SqlType::Integer => String::from("INTEGER"),
            SqlType::String(Some(len)) => format!("VARCHAR({len})"),
            SqlType::String(None) | SqlType::Text | SqlType::Null => String::from("TEXT"),
            SqlType::DateTime => String::from("TIMESTAMP"),
            SqlType::Binary => String::from("BLOB"),
            SqlType::Boolean => String::from("BOOLEAN"),
        }
    }

    // OFFSET requires a LIMIT in SQLite.
    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (None, Some(offset)) => format!(" LIMIT -1 OFFSET {offset}"),
        }
    }

    fn coerce_result(&self, value: SqlValue, ty: &SqlType) -> SqlValue {
        match (ty, value) {
            (SqlType::Boolean, SqlValue::Int(n)) => SqlValue::Bool(n != 0),
            (SqlType::DateTime, SqlValue::Text(text)) => TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())
                .map_or(SqlValue::Text(text), SqlValue::Timestamp),
            #[allow(clippy::cast_precision_loss)]
            (SqlType::Float | SqlType::Numeric { .. }, SqlValue::Int(n)) => SqlValue::Float(n as f64),
            (_, value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_sqlite_dialect() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.name(), "sqlite");
        assert_eq!(dialect.identifier_quote(), '"');
        assert_eq!(dialect.render_type(&SqlType::Float), "REAL");
        assert_eq!(dialect.limit_clause(None, Some(3)), " LIMIT -1 OFFSET 3");
    }

    #[test]
    fn test_result_coercion() {
        let dialect = SqliteDialect::new();
        assert_eq!(
            dialect.coerce_result(SqlValue::Int(1), &SqlType::Boolean),
            SqlValue::Bool(true)
        );
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        assert_eq!(
            dialect.coerce_result(SqlValue::Text("2024-01-02 03:04:05".into()), &SqlType::DateTime),
            SqlValue::Timestamp(ts)
        );
    }

    #[test]
    fn test_parse_declared_types() {
        assert_eq!(SqliteDialect::parse_type("VARCHAR(40)"), SqlType::varchar(40));
        assert_eq!(
            SqliteDialect::parse_type("numeric(10, 2)"),
            SqlType::Numeric { precision: 10, scale: 2 }
        );
        assert_eq!(SqliteDialect::parse_type("INTEGER"), SqlType::Integer);
    }
}
