//! Generic SQL dialect.

use super::{Dialect, ParamStyle};

/// A generic SQL dialect using ANSI SQL standards.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDialect {
    param_style: ParamStyle,
}

impl GenericDialect {
    /// Creates a new generic dialect with `?` parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            param_style: ParamStyle::Qmark,
        }
    }

    /// Creates a generic dialect with the given parameter style.
    #[must_use]
    pub const fn with_param_style(param_style: ParamStyle) -> Self {
        Self { param_style }
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn param_style(&self) -> ParamStyle {
        self.param_style
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;

    #[test]
    fn test_generic_dialect() {
        let dialect = GenericDialect::new();
        assert_eq!(dialect.name(), "generic");
        assert_eq!(dialect.identifier_quote(), '"');
        assert_eq!(dialect.param_style(), ParamStyle::Qmark);
        assert!(dialect.supports_sane_rowcount());
    }

    #[test]
    fn test_generic_type_rendering() {
        let dialect = GenericDialect::new();
        assert_eq!(dialect.render_type(&SqlType::varchar(40)), "VARCHAR(40)");
        assert_eq!(
            dialect.render_type(&SqlType::Numeric { precision: 10, scale: 2 }),
            "NUMERIC(10, 2)"
        );
        assert_eq!(dialect.limit_clause(Some(5), Some(10)), " LIMIT 5 OFFSET 10");
    }
}
