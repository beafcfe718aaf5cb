//! Command implementations

mod analyze;
mod config;
mod db;
mod lookup;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);

    match &cli.command {
        Commands::Analyze(args) => analyze::execute(&cli, args, &output).await,
        Commands::Lookup(args) => lookup::execute(&cli, args, &output).await,
        Commands::Config => config::execute(&cli, &output),
        Commands::Db(args) => db::execute(args, &output).await,
    }
}
