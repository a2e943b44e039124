//! Command-line argument parsing, matching `flowscope-cli::cli`'s derive-API
//! shape: a single `Args` struct gated by feature flags where a flag only
//! makes sense with a particular Cargo feature enabled.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Analyze SQL for table-level lineage and column-level join relationships.
#[derive(Parser, Debug)]
#[command(name = "lineage")]
#[command(about = "Analyze SQL for data lineage and join relationships", long_about = None)]
#[command(version)]
pub struct Args {
    /// SQL file to analyze (reads from stdin if omitted)
    #[arg(long, value_name = "PATH")]
    pub sql: Option<PathBuf>,

    /// Logical database label prefixed onto every node id (spec's
    /// `<namespace>.<schema>.<relation>` identity convention)
    #[arg(long, default_value = "")]
    pub namespace: String,

    /// Postgres connection string; when set, UDF bodies are fetched from
    /// the live catalog so lineage recurses into function definitions
    #[cfg(feature = "postgres-catalog")]
    #[arg(long, value_name = "URL")]
    pub dsn: Option<String>,

    /// Output format
    #[arg(long, default_value = "json", value_enum)]
    pub format: OutputFormat,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}
