use std::env;
use std::path::PathBuf;

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub cors_origin: String,
    pub database_url: Option<String>,
    /// Optional TOML file layered under the environment
    pub config_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 5001,
            cors_origin: "http://localhost:3000".to_string(),
            database_url: None,
            config_file: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env::var("FIELDSENSE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let cors_origin = env::var("FIELDSENSE_CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

        let config_file = env::var("FIELDSENSE_CONFIG").ok().map(PathBuf::from);

        Self { port, cors_origin, database_url, config_file }
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Check if PostgreSQL storage is configured
    pub fn uses_postgres(&self) -> bool {
        self.database_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in ["FIELDSENSE_PORT", "FIELDSENSE_CORS_ORIGIN", "DATABASE_URL", "FIELDSENSE_CONFIG"] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ApiConfig::from_env();
        assert_eq!(config.port, 5001);
        assert_eq!(config.bind_address(), "0.0.0.0:5001");
        assert!(!config.uses_postgres());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("FIELDSENSE_PORT", "8080");
        env::set_var("FIELDSENSE_CORS_ORIGIN", "https://fields.example.org");
        env::set_var("DATABASE_URL", "postgres://localhost/fieldsense");

        let config = ApiConfig::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origin, "https://fields.example.org");
        assert!(config.uses_postgres());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_falls_back() {
        clear_env();
        env::set_var("FIELDSENSE_PORT", "not-a-port");
        assert_eq!(ApiConfig::from_env().port, 5001);
        clear_env();
    }
}
