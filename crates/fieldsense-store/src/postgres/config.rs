//! Connection settings for the PostgreSQL metadata store.

use fieldsense_core::error::{FieldsenseError, Result};
use std::time::Duration;

const DATABASE_URL: &str = "DATABASE_URL";
const MAX_CONNECTIONS: &str = "FIELDSENSE_DB_MAX_CONNECTIONS";
const ACQUIRE_TIMEOUT: &str = "FIELDSENSE_DB_ACQUIRE_TIMEOUT_SECS";
const AUTO_MIGRATE: &str = "FIELDSENSE_DB_AUTO_MIGRATE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub database_url: String,
    /// Analysis requests hold a connection only while persisting, so the
    /// pool stays small
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Apply pending migrations when the store connects
    pub auto_migrate: bool,
}

impl PostgresConfig {
    pub fn new(database_url: impl Into<String>) -> Result<Self> {
        let config = Self {
            database_url: database_url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            auto_migrate: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read `DATABASE_URL` plus the optional `FIELDSENSE_DB_*` overrides
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = var(DATABASE_URL)
            .ok_or_else(|| FieldsenseError::ConfigMissing { key: DATABASE_URL.to_string() })?;
        let mut config = Self::new(url)?;

        if let Some(value) = var(MAX_CONNECTIONS) {
            config.max_connections = parse(MAX_CONNECTIONS, &value)?;
        }
        if let Some(value) = var(ACQUIRE_TIMEOUT) {
            config.acquire_timeout = Duration::from_secs(parse(ACQUIRE_TIMEOUT, &value)?);
        }
        if let Some(value) = var(AUTO_MIGRATE) {
            config.auto_migrate = matches!(value.trim(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(invalid("database_url", "cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(invalid("max_connections", "must be greater than 0"));
        }
        if self.acquire_timeout.is_zero() {
            return Err(invalid("acquire_timeout", "must be greater than 0"));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, &format!("'{}' is not a positive integer", value)))
}

fn invalid(key: &str, reason: &str) -> FieldsenseError {
    FieldsenseError::ConfigInvalid { key: key.to_string(), reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PostgresConfig::new("postgresql://localhost/fieldsense").unwrap();
        assert_eq!(config.max_connections, 5);
        assert!(!config.auto_migrate);
    }

    #[test]
    fn test_blank_url_rejected() {
        let err = PostgresConfig::new("  ").unwrap_err();
        assert!(matches!(err, FieldsenseError::ConfigInvalid { key, .. } if key == "database_url"));
    }

    #[test]
    fn test_missing_url() {
        let err = PostgresConfig::from_vars(vars(&[])).unwrap_err();
        assert!(matches!(err, FieldsenseError::ConfigMissing { key } if key == "DATABASE_URL"));
    }

    #[test]
    fn test_overrides_from_vars() {
        let config = PostgresConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgresql://db/fields"),
            ("FIELDSENSE_DB_MAX_CONNECTIONS", "12"),
            ("FIELDSENSE_DB_ACQUIRE_TIMEOUT_SECS", "3"),
            ("FIELDSENSE_DB_AUTO_MIGRATE", "true"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 12);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
        assert!(config.auto_migrate);
    }

    #[test]
    fn test_zero_connections_rejected() {
        let err = PostgresConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgresql://db/fields"),
            ("FIELDSENSE_DB_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, FieldsenseError::ConfigInvalid { key, .. } if key == "max_connections"));
    }

    #[test]
    fn test_unparsable_override() {
        let err = PostgresConfig::from_vars(vars(&[
            ("DATABASE_URL", "postgresql://db/fields"),
            ("FIELDSENSE_DB_ACQUIRE_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, FieldsenseError::ConfigInvalid { .. }));
    }
}
