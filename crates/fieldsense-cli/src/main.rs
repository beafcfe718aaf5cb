//! FieldSense CLI - Command-line interface
//!
//! Operator tool for running analyses, inspecting cached results and
//! managing the metadata database.

mod cli;
mod commands;
mod config;
mod errors;
mod output;
mod output_types;
mod storage;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Create async runtime
    let runtime = tokio::runtime::Runtime::new()?;

    // Execute the command
    if let Err(e) = runtime.block_on(commands::execute(cli)) {
        match e.downcast_ref::<errors::CliError>() {
            Some(cli_error) => cli_error.display(),
            None => errors::CliError::new(format!("{:#}", e)).display(),
        }
        std::process::exit(1);
    }

    Ok(())
}
