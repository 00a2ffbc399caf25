//! Command-line interface for tabsync

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Database used when neither the command line nor a manifest names one
pub const DEFAULT_DATABASE: &str = "tabsync.duckdb";

#[derive(Parser)]
#[command(name = "tabsync")]
#[command(about = "Import tabular files into DuckDB tables with widen-only schemas and row history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database file (defaults to tabsync.duckdb)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a CSV, TSV, Parquet or JSON file into a table
    Import {
        /// Input file path
        input: String,

        /// Target table
        #[arg(long)]
        table: String,

        /// Primary key column (defaults to the first column)
        #[arg(long)]
        primary_key: Option<String>,

        /// Multiplier applied to the longest text value when sizing text columns
        #[arg(long, value_parser = validate_length_weight)]
        length_weight: Option<f64>,

        /// Text length above which columns become unbounded TEXT
        #[arg(long, value_parser = validate_length_limit)]
        length_limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the imports listed in a JSON manifest, in order
    Batch {
        /// Manifest file path
        manifest: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored schema of a table
    Schema {
        /// Table name
        table: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Show archived versions of a table's rows
    History {
        /// Table name
        table: String,

        /// Only rows with this primary key value
        #[arg(long)]
        key: Option<String>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },
}

/// Parse output format string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

fn validate_length_weight(s: &str) -> Result<f64, String> {
    let weight: f64 = s
        .parse()
        .map_err(|_| format!("Invalid length weight: '{}'. Must be a number.", s))?;

    if !weight.is_finite() || weight <= 0.0 {
        return Err("Length weight must be greater than 0".to_string());
    }

    Ok(weight)
}

fn validate_length_limit(s: &str) -> Result<usize, String> {
    let limit: usize = s
        .parse()
        .map_err(|_| format!("Invalid length limit: '{}'. Must be a positive integer.", s))?;

    if limit == 0 {
        return Err("Length limit must be greater than 0".to_string());
    }

    Ok(limit)
}
