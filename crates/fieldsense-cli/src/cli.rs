use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FieldSense - Per-field agronomic indicators from satellite imagery
#[derive(Parser, Debug)]
#[command(name = "fieldsense")]
#[command(about = "Per-field agronomic indicators from satellite imagery", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Storage backend to use (memory or postgres)
    #[arg(long, global = true, default_value = "memory")]
    pub storage: StorageBackend,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Raster engine URL (http(s):// or file://<catalog.json>)
    #[arg(long, global = true)]
    pub engine_url: Option<String>,

    /// Directory exported rasters are written to
    #[arg(long, global = true)]
    pub export_dir: Option<PathBuf>,

    /// Maximum cloudy-pixel percentage of optical scenes
    #[arg(long, global = true)]
    pub cloud_cover: Option<f64>,

    /// Look-back windows in days, e.g. "14,30,60,90"
    #[arg(long, global = true)]
    pub window_days: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageBackend {
    /// In-memory storage (default, for development)
    Memory,
    /// PostgreSQL persistent storage
    Postgres,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the analysis pipeline for one field
    Analyze(AnalyzeArgs),

    /// Show the cached analysis of a field
    Lookup(LookupArgs),

    /// Show the resolved configuration and where each value came from
    Config,

    /// Manage database operations
    Db(DbArgs),
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Field identifier
    #[arg(long)]
    pub field_id: String,

    /// GeoJSON file holding the field boundary (geometry, feature or
    /// single-feature collection)
    #[arg(long, value_name = "FILE")]
    pub aoi: PathBuf,

    /// Analysis date (YYYY-MM-DD), defaults to today in UTC
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Parser, Debug)]
pub struct LookupArgs {
    /// Field identifier
    #[arg(long)]
    pub field_id: String,

    /// Analysis date (YYYY-MM-DD), defaults to today in UTC
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Parser, Debug)]
pub struct DbArgs {
    /// Database management command
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate,

    /// Show applied and pending migrations
    Status,
}
