//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Batch-load files into BigQuery through the PutBigQueryBatch processor
#[derive(Parser, Debug)]
#[command(name = "bq-batch-load")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the processor's properties, relationships and written attributes
    Properties,

    /// Translate a JSON field list into a table schema
    Schema {
        /// Inline field list JSON
        #[arg(long, conflicts_with = "file")]
        schema: Option<String>,

        /// File containing the field list
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Validate a loader configuration without contacting the warehouse
    Validate {
        /// Loader configuration file (YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Load each file as one unit
    Load {
        /// Loader configuration file (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Attribute set on every unit (repeatable)
        #[arg(short, long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,

        /// Payload files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

/// Parse a `name=value` attribute
fn parse_attribute(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}
