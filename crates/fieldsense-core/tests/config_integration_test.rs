//! Integration tests for layered configuration
//!
//! These tests verify that configuration loading follows the correct precedence:
//! CLI arguments > Environment variables > Config file > Defaults

use fieldsense_core::config::{CliConfigOverrides, ConfigSource, LayeredConfig};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn clear_env() {
    for key in [
        "FIELDSENSE_CLOUD_COVER",
        "FIELDSENSE_RESOLUTION",
        "FIELDSENSE_WINDOW_DAYS",
        "FIELDSENSE_EXPORT_DIR",
        "FIELDSENSE_URL_PREFIX",
        "FIELDSENSE_ENGINE_URL",
        "FIELDSENSE_ENGINE_TIMEOUT",
    ] {
        env::remove_var(key);
    }
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", contents).unwrap();
    file
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let file = config_file(
        r#"
cloud_cover_threshold = 10.0
window_days = [7, 14]
"#,
    );

    env::set_var("FIELDSENSE_CLOUD_COVER", "35");
    env::set_var("FIELDSENSE_ENGINE_URL", "http://engine:9000");

    let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap().load_from_env();

    assert_eq!(config.cloud_cover_threshold.value, 35.0);
    assert_eq!(config.cloud_cover_threshold.source, ConfigSource::Environment);
    assert_eq!(config.window_days.value, vec![7, 14]);
    assert_eq!(config.window_days.source, ConfigSource::File);
    assert_eq!(config.engine_url.value.as_deref(), Some("http://engine:9000"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_environment() {
    clear_env();
    env::set_var("FIELDSENSE_EXPORT_DIR", "/tmp/from-env");
    env::set_var("FIELDSENSE_WINDOW_DAYS", "30,90");

    let mut config = LayeredConfig::with_defaults().load_from_env();
    config.update_from_cli(CliConfigOverrides {
        export_dir: Some(PathBuf::from("/tmp/from-cli")),
        ..Default::default()
    });

    assert_eq!(config.export_dir.value, PathBuf::from("/tmp/from-cli"));
    assert_eq!(config.export_dir.source, ConfigSource::Cli);
    assert_eq!(config.window_days.value, vec![30, 90]);
    assert_eq!(config.window_days.source, ConfigSource::Environment);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_environment_values_are_ignored() {
    clear_env();
    env::set_var("FIELDSENSE_CLOUD_COVER", "cloudy");
    env::set_var("FIELDSENSE_WINDOW_DAYS", "fortnight");
    env::set_var("FIELDSENSE_ENGINE_TIMEOUT", "-5");

    let config = LayeredConfig::with_defaults().load_from_env();

    assert_eq!(config.cloud_cover_threshold.value, 20.0);
    assert_eq!(config.cloud_cover_threshold.source, ConfigSource::Default);
    assert_eq!(config.window_days.value, vec![14, 30, 60, 90]);
    assert_eq!(config.engine_timeout_secs.source, ConfigSource::Default);

    clear_env();
}

#[test]
fn test_malformed_file_is_rejected() {
    let file = config_file("cloud_cover_threshold = \"twenty\"");
    assert!(LayeredConfig::with_defaults().load_from_file(file.path()).is_err());
}

#[test]
fn test_missing_file_is_rejected() {
    let result = LayeredConfig::with_defaults().load_from_file("/nonexistent/fieldsense.toml");
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_resolved_settings_follow_layers() {
    clear_env();
    let file = config_file(
        r#"
resolution_meters = 20.0
engine_timeout_secs = 30
url_prefix = "/files/"
"#,
    );
    env::set_var("FIELDSENSE_ENGINE_TIMEOUT", "45");

    let settings = LayeredConfig::with_defaults()
        .load_from_file(file.path())
        .unwrap()
        .load_from_env()
        .settings()
        .unwrap();

    assert_eq!(settings.resolution_meters, 20.0);
    assert_eq!(settings.engine_timeout.as_secs(), 45);
    assert_eq!(settings.url_prefix, "/files");

    clear_env();
}
