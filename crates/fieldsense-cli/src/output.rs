//! Terminal output for human readers or scripts.
//!
//! In JSON mode stdout carries exactly one document per command: the
//! `result` payload, or a status line for commands without one. Warnings go
//! to stderr in both modes.

use console::style;
use serde::Serialize;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        let format = if json { OutputFormat::Json } else { OutputFormat::Human };
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn success(&self, message: impl Display) {
        if self.is_json() {
            println!("{}", status_line("success", message));
        } else {
            println!("{} {}", style("✓").green().bold(), message);
        }
    }

    /// Progress notes, dropped in JSON mode
    pub fn info(&self, message: impl Display) {
        if !self.is_json() {
            println!("{} {}", style("ℹ").cyan(), message);
        }
    }

    pub fn warning(&self, message: impl Display) {
        if self.is_json() {
            eprintln!("{}", status_line("warning", message));
        } else {
            eprintln!("{} {}", style("⚠").yellow().bold(), message);
        }
    }

    pub fn section(&self, title: impl Display) {
        println!("\n{}", style(title).bold().underlined());
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        println!("  {:<14} {}", style(format!("{}:", key)).bold(), value);
    }

    pub fn table<T: Tabled>(&self, rows: Vec<T>) {
        if rows.is_empty() {
            println!("{}", style("(nothing to show)").dim());
            return;
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }

    /// Print `data` as the command's JSON result
    pub fn result<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        let document = serde_json::json!({ "status": "success", "data": data });
        println!("{}", serde_json::to_string_pretty(&document)?);
        Ok(())
    }
}

fn status_line(status: &str, message: impl Display) -> String {
    serde_json::json!({ "status": status, "message": message.to_string() }).to_string()
}
