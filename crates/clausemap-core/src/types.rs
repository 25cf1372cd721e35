//! Column types.
//!
//! Types are abstract; each [`Dialect`](crate::Dialect) renders them into
//! DDL and may coerce values on the way in and out of the database.

/// An abstract column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlType {
    /// Untyped; used for bind parameters with no column to infer from.
    #[default]
    Null,
    /// Integer.
    Integer,
    /// Variable-length string with an optional length.
    String(Option<u32>),
    /// Unbounded text.
    Text,
    /// Fixed-point numeric.
    Numeric {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Floating point.
    Float,
    /// Date and time without a zone.
    DateTime,
    /// Binary blob.
    Binary,
    /// Boolean.
    Boolean,
}

impl SqlType {
    /// Shorthand for `String(Some(length))`.
    #[must_use]
    pub const fn varchar(length: u32) -> Self {
        Self::String(Some(length))
    }
}
