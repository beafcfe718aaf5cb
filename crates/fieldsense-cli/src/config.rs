//! Configuration loading for CLI commands

use anyhow::{Context, Result};
use fieldsense_core::config::{parse_window_days, CliConfigOverrides, LayeredConfig};

use crate::cli::Cli;

/// Defaults, then the optional TOML file, then `FIELDSENSE_*` variables,
/// then command-line flags
pub fn load_config(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();
    if let Some(path) = &cli.config {
        config = config
            .load_from_file(path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
    }
    let mut config = config.load_from_env();

    let window_days = cli
        .window_days
        .as_deref()
        .map(parse_window_days)
        .transpose()
        .context("Invalid --window-days")?;

    config.update_from_cli(CliConfigOverrides {
        cloud_cover_threshold: cli.cloud_cover,
        window_days,
        export_dir: cli.export_dir.clone(),
        engine_url: cli.engine_url.clone(),
    });

    Ok(config)
}
