use crate::error::{FieldsenseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default look-back candidates, in days, tried narrowest first
pub const DEFAULT_WINDOW_DAYS: [u32; 4] = [14, 30, 60, 90];

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Resolved settings consumed by the analysis pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    /// Scenes at or above this cloudy-pixel percentage are ignored
    pub cloud_cover_threshold: f64,
    /// Export and reduction scale in meters per pixel
    pub resolution_meters: f64,
    /// Look-back candidates in days
    pub window_days: Vec<u32>,
    /// Directory exported rasters are written to
    pub export_dir: PathBuf,
    /// Public URL prefix under which `export_dir` is served
    pub url_prefix: String,
    /// Upper bound for a single raster engine call
    pub engine_timeout: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            cloud_cover_threshold: 20.0,
            resolution_meters: 10.0,
            window_days: DEFAULT_WINDOW_DAYS.to_vec(),
            export_dir: PathBuf::from("analysis_files"),
            url_prefix: "/analysis_files".to_string(),
            engine_timeout: Duration::from_secs(120),
        }
    }
}

/// Layered configuration for FieldSense
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub cloud_cover_threshold: ConfigValue<f64>,
    pub resolution_meters: ConfigValue<f64>,
    pub window_days: ConfigValue<Vec<u32>>,
    pub export_dir: ConfigValue<PathBuf>,
    pub url_prefix: ConfigValue<String>,
    pub engine_url: ConfigValue<Option<String>>,
    pub engine_timeout_secs: ConfigValue<u64>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        let defaults = AnalysisSettings::default();
        Self {
            cloud_cover_threshold: ConfigValue::new(
                defaults.cloud_cover_threshold,
                ConfigSource::Default,
            ),
            resolution_meters: ConfigValue::new(defaults.resolution_meters, ConfigSource::Default),
            window_days: ConfigValue::new(defaults.window_days, ConfigSource::Default),
            export_dir: ConfigValue::new(defaults.export_dir, ConfigSource::Default),
            url_prefix: ConfigValue::new(defaults.url_prefix, ConfigSource::Default),
            engine_url: ConfigValue::new(None, ConfigSource::Default),
            engine_timeout_secs: ConfigValue::new(
                defaults.engine_timeout.as_secs(),
                ConfigSource::Default,
            ),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| FieldsenseError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| FieldsenseError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(threshold) = file_config.cloud_cover_threshold {
            self.cloud_cover_threshold.update(threshold, ConfigSource::File);
        }

        if let Some(resolution) = file_config.resolution_meters {
            self.resolution_meters.update(resolution, ConfigSource::File);
        }

        if let Some(days) = file_config.window_days {
            self.window_days.update(days, ConfigSource::File);
        }

        if let Some(dir) = file_config.export_dir {
            self.export_dir.update(dir, ConfigSource::File);
        }

        if let Some(prefix) = file_config.url_prefix {
            self.url_prefix.update(prefix, ConfigSource::File);
        }

        if let Some(url) = file_config.engine_url {
            self.engine_url.update(Some(url), ConfigSource::File);
        }

        if let Some(secs) = file_config.engine_timeout_secs {
            self.engine_timeout_secs.update(secs, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // FIELDSENSE_CLOUD_COVER
        if let Ok(value) = env::var("FIELDSENSE_CLOUD_COVER") {
            match value.parse::<f64>() {
                Ok(threshold) => {
                    self.cloud_cover_threshold.update(threshold, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid FIELDSENSE_CLOUD_COVER value '{}': expected a percentage",
                    value
                ),
            }
        }

        // FIELDSENSE_RESOLUTION
        if let Ok(value) = env::var("FIELDSENSE_RESOLUTION") {
            match value.parse::<f64>() {
                Ok(resolution) => {
                    self.resolution_meters.update(resolution, ConfigSource::Environment)
                }
                Err(_) => tracing::warn!(
                    "Invalid FIELDSENSE_RESOLUTION value '{}': expected meters per pixel",
                    value
                ),
            }
        }

        // FIELDSENSE_WINDOW_DAYS
        if let Ok(value) = env::var("FIELDSENSE_WINDOW_DAYS") {
            match parse_window_days(&value) {
                Ok(days) => self.window_days.update(days, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid FIELDSENSE_WINDOW_DAYS value '{}': expected comma-separated days",
                    value
                ),
            }
        }

        // FIELDSENSE_EXPORT_DIR
        if let Ok(value) = env::var("FIELDSENSE_EXPORT_DIR") {
            self.export_dir.update(PathBuf::from(value), ConfigSource::Environment);
        }

        // FIELDSENSE_URL_PREFIX
        if let Ok(value) = env::var("FIELDSENSE_URL_PREFIX") {
            self.url_prefix.update(value, ConfigSource::Environment);
        }

        // FIELDSENSE_ENGINE_URL
        if let Ok(value) = env::var("FIELDSENSE_ENGINE_URL") {
            self.engine_url.update(Some(value), ConfigSource::Environment);
        }

        // FIELDSENSE_ENGINE_TIMEOUT
        if let Ok(value) = env::var("FIELDSENSE_ENGINE_TIMEOUT") {
            match value.parse::<u64>() {
                Ok(secs) => self.engine_timeout_secs.update(secs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid FIELDSENSE_ENGINE_TIMEOUT value '{}': expected seconds",
                    value
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(threshold) = overrides.cloud_cover_threshold {
            self.cloud_cover_threshold.update(threshold, ConfigSource::Cli);
        }

        if let Some(days) = overrides.window_days {
            self.window_days.update(days, ConfigSource::Cli);
        }

        if let Some(dir) = overrides.export_dir {
            self.export_dir.update(dir, ConfigSource::Cli);
        }

        if let Some(url) = overrides.engine_url {
            self.engine_url.update(Some(url), ConfigSource::Cli);
        }
    }

    /// Validate and resolve into pipeline settings
    pub fn settings(&self) -> Result<AnalysisSettings> {
        let threshold = self.cloud_cover_threshold.value;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(FieldsenseError::ConfigInvalid {
                key: "cloud_cover_threshold".to_string(),
                reason: format!("{} is not a percentage", threshold),
            });
        }

        let resolution = self.resolution_meters.value;
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(FieldsenseError::ConfigInvalid {
                key: "resolution_meters".to_string(),
                reason: "must be a positive number".to_string(),
            });
        }

        if self.window_days.value.is_empty() {
            return Err(FieldsenseError::ConfigInvalid {
                key: "window_days".to_string(),
                reason: "at least one look-back window is required".to_string(),
            });
        }

        if self.engine_timeout_secs.value == 0 {
            return Err(FieldsenseError::ConfigInvalid {
                key: "engine_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(AnalysisSettings {
            cloud_cover_threshold: threshold,
            resolution_meters: resolution,
            window_days: self.window_days.value.clone(),
            export_dir: self.export_dir.value.clone(),
            url_prefix: self.url_prefix.value.trim_end_matches('/').to_string(),
            engine_timeout: Duration::from_secs(self.engine_timeout_secs.value),
        })
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "cloud_cover_threshold".to_string(),
            (format!("{}%", self.cloud_cover_threshold.value), self.cloud_cover_threshold.source),
        );

        map.insert(
            "resolution_meters".to_string(),
            (format!("{} m", self.resolution_meters.value), self.resolution_meters.source),
        );

        let days: Vec<String> = self.window_days.value.iter().map(|d| d.to_string()).collect();
        map.insert("window_days".to_string(), (days.join(","), self.window_days.source));

        map.insert(
            "export_dir".to_string(),
            (self.export_dir.value.display().to_string(), self.export_dir.source),
        );

        map.insert("url_prefix".to_string(), (self.url_prefix.value.clone(), self.url_prefix.source));

        map.insert(
            "engine_url".to_string(),
            (
                self.engine_url.value.clone().unwrap_or_else(|| "local".to_string()),
                self.engine_url.source,
            ),
        );

        map.insert(
            "engine_timeout_secs".to_string(),
            (format!("{}s", self.engine_timeout_secs.value), self.engine_timeout_secs.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    cloud_cover_threshold: Option<f64>,
    resolution_meters: Option<f64>,
    window_days: Option<Vec<u32>>,
    export_dir: Option<PathBuf>,
    url_prefix: Option<String>,
    engine_url: Option<String>,
    engine_timeout_secs: Option<u64>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub cloud_cover_threshold: Option<f64>,
    pub window_days: Option<Vec<u32>>,
    pub export_dir: Option<PathBuf>,
    pub engine_url: Option<String>,
}

/// Parse a comma-separated list of look-back days, e.g. "14,30,60,90"
pub fn parse_window_days(s: &str) -> Result<Vec<u32>> {
    let days = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>().ok().filter(|d| *d > 0).ok_or_else(|| {
                FieldsenseError::ConfigInvalid {
                    key: "window_days".to_string(),
                    reason: format!("'{}' is not a positive number of days", part),
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if days.is_empty() {
        return Err(FieldsenseError::ConfigInvalid {
            key: "window_days".to_string(),
            reason: "no days given".to_string(),
        });
    }

    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.cloud_cover_threshold.value, 20.0);
        assert_eq!(config.cloud_cover_threshold.source, ConfigSource::Default);
        assert_eq!(config.resolution_meters.value, 10.0);
        assert_eq!(config.window_days.value, vec![14, 30, 60, 90]);
        assert!(config.engine_url.value.is_none());
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        // File should override default
        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        // Environment should override file
        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);
        assert_eq!(value.source, ConfigSource::Environment);

        // CLI should override environment
        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
cloud_cover_threshold = 10.0
window_days = [7, 21]
export_dir = "/var/lib/fieldsense/exports"
engine_url = "http://engine.internal:8080"
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.cloud_cover_threshold.value, 10.0);
        assert_eq!(config.cloud_cover_threshold.source, ConfigSource::File);
        assert_eq!(config.window_days.value, vec![7, 21]);
        assert_eq!(config.export_dir.value, PathBuf::from("/var/lib/fieldsense/exports"));
        assert_eq!(config.engine_url.value.as_deref(), Some("http://engine.internal:8080"));
        assert_eq!(config.resolution_meters.source, ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_cli(CliConfigOverrides {
            cloud_cover_threshold: Some(5.0),
            window_days: None,
            export_dir: None,
            engine_url: None,
        });

        assert_eq!(config.cloud_cover_threshold.value, 5.0);
        assert_eq!(config.cloud_cover_threshold.source, ConfigSource::Cli);
        assert_eq!(config.window_days.source, ConfigSource::Default);
    }

    #[test]
    fn test_settings_validation() {
        let settings = LayeredConfig::with_defaults().settings().unwrap();
        assert_eq!(settings, AnalysisSettings::default());

        let mut config = LayeredConfig::with_defaults();
        config.cloud_cover_threshold.update(150.0, ConfigSource::Cli);
        assert!(config.settings().is_err());

        let mut config = LayeredConfig::with_defaults();
        config.window_days.update(Vec::new(), ConfigSource::Cli);
        assert!(config.settings().is_err());
    }

    #[test]
    fn test_settings_trims_url_prefix() {
        let mut config = LayeredConfig::with_defaults();
        config.url_prefix.update("https://cdn.example.com/files/".to_string(), ConfigSource::File);
        assert_eq!(config.settings().unwrap().url_prefix, "https://cdn.example.com/files");
    }

    #[test]
    fn test_parse_window_days() {
        assert_eq!(parse_window_days("14,30,60,90").unwrap(), vec![14, 30, 60, 90]);
        assert_eq!(parse_window_days(" 7 , 21 ").unwrap(), vec![7, 21]);
        assert!(parse_window_days("").is_err());
        assert!(parse_window_days("14,zero").is_err());
        assert!(parse_window_days("0").is_err());
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        let (days, source) = &map["window_days"];
        assert_eq!(days, "14,30,60,90");
        assert_eq!(*source, ConfigSource::Default);

        let (engine, _) = &map["engine_url"];
        assert_eq!(engine, "local");
    }
}
