//! Runtime settings for a [`Registry`](crate::Registry).

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// ORM settings.
///
/// Missing keys take their defaults, so `{}` is a valid configuration.
///
/// ```rust
/// use clausemap_orm::OrmConfig;
///
/// let config = OrmConfig::from_json(r#"{"echo": true}"#).unwrap();
/// assert!(config.echo);
/// assert_eq!(config.statement_cache_size, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Log every statement at INFO instead of DEBUG.
    pub echo: bool,
    /// Compiled statements kept before the cache is cleared.
    pub statement_cache_size: usize,
    /// Order mapper selects by primary key when no ordering is given.
    pub order_by_primary_key: bool,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            echo: false,
            statement_cache_size: 256,
            order_by_primary_key: true,
        }
    }
}

impl OrmConfig {
    /// Parses settings from JSON.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or a setting of the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = OrmConfig::from_json("{}").unwrap();
        assert_eq!(config, OrmConfig::default());
        assert!(config.order_by_primary_key);
    }

    #[test]
    fn test_partial_override() {
        let config =
            OrmConfig::from_json(r#"{"statement_cache_size": 8, "order_by_primary_key": false}"#)
                .unwrap();
        assert_eq!(config.statement_cache_size, 8);
        assert!(!config.order_by_primary_key);
        assert!(!config.echo);
    }

    #[test]
    fn test_invalid_json() {
        assert!(OrmConfig::from_json("{echo: yes").is_err());
    }
}
