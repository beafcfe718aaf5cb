//! Config command implementation

use anyhow::Result;

use crate::cli::Cli;
use crate::config::load_config;
use crate::output::OutputWriter;
use crate::output_types::ConfigRow;

pub fn execute(cli: &Cli, output: &OutputWriter) -> Result<()> {
    let config = load_config(cli)?;
    // surface invalid combinations before an analysis trips over them
    config.settings()?;

    let mut rows: Vec<ConfigRow> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    if output.is_json() {
        return output.result(rows);
    }

    output.section("Configuration");
    output.table(rows);
    Ok(())
}
