//! SQL Dialect support.
//!
//! Different databases have slightly different SQL syntax. This module provides
//! a trait for dialect-specific behavior: parameter style, type rendering,
//! value coercion and a few capability flags.

mod generic;

pub use generic::GenericDialect;

use crate::types::SqlType;
use crate::value::SqlValue;

/// How bind parameters are written in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamStyle {
    /// `?`, bound positionally in order of appearance.
    #[default]
    Qmark,
    /// `$1`, `$2`, one number per distinct parameter.
    Numbered,
    /// `:name`, one entry per distinct parameter.
    Named,
}

/// Trait for SQL dialect-specific behavior.
pub trait Dialect: Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the parameter placeholder style.
    fn param_style(&self) -> ParamStyle {
        ParamStyle::Qmark
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        format!("{quote}{name}{quote}")
    }

    /// Renders a column type for DDL.
    fn render_type(&self, ty: &SqlType) -> String {
        match ty {
            SqlType::Integer => String::from("INTEGER"),
            SqlType::String(Some(len)) => format!("VARCHAR({len})"),
            SqlType::String(None) | SqlType::Text | SqlType::Null => String::from("TEXT"),
            SqlType::Numeric { precision, scale } => format!("NUMERIC({precision}, {scale})"),
            SqlType::Float => String::from("FLOAT"),
            SqlType::DateTime => String::from("TIMESTAMP"),
            SqlType::Binary => String::from("BLOB"),
            SqlType::Boolean => String::from("BOOLEAN"),
        }
    }

    /// Renders LIMIT and OFFSET, with a leading space when non-empty.
    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// Converts a value before it is bound.
    fn coerce_bind(&self, value: SqlValue, ty: &SqlType) -> SqlValue {
        let _ = ty;
        value
    }

    /// Converts a value read from a result row.
    fn coerce_result(&self, value: SqlValue, ty: &SqlType) -> SqlValue {
        let _ = ty;
        value
    }

    /// Whether UPDATE and DELETE report accurate affected-row counts.
    fn supports_sane_rowcount(&self) -> bool {
        true
    }

    /// Whether the database has native sequences.
    fn supports_sequences(&self) -> bool {
        false
    }
}
