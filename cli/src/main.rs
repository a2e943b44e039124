//! `lineage`: a thin front door over `lineage-core`. Reads SQL from a
//! file or stdin, runs the lineage and join extractors, optionally
//! resolving UDF bodies against a live Postgres catalog, and prints the
//! contracted graph plus the relationship set as JSON or a plain table.
//!
//! Grounded in `flowscope-cli::main`'s read-analyze-write shape, reduced
//! to the two output formats and single producer/consumer pairing the
//! design notes call for (spec's "writers external to the core, plain
//! collections in, plain collections out").

mod cli;
mod output;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use lineage_core::{CatalogProvider, Graph, JoinExtractor, LineageExtractor};
#[cfg(not(feature = "postgres-catalog"))]
use lineage_core::NullCatalogProvider;

use cli::{Args, OutputFormat};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lineage: error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: &Args) -> Result<()> {
    let sql = read_sql(args.sql.as_ref())?;

    #[cfg(feature = "postgres-catalog")]
    let catalog: Box<dyn CatalogProvider> = resolve_catalog(args)?;
    #[cfg(not(feature = "postgres-catalog"))]
    let catalog: Box<dyn CatalogProvider> = Box::new(NullCatalogProvider);

    let mut graph = Graph::new();
    let extractor = LineageExtractor::new(args.namespace.as_str()).with_catalog(catalog.as_ref());
    extractor
        .extract(&sql, &mut graph)
        .context("failed to extract lineage")?;
    graph.contract();

    let relationships = JoinExtractor::new()
        .extract(&sql)
        .context("failed to extract join relationships")?;

    let report = output::Report::build(&args.namespace, &graph, &relationships);
    let rendered = match args.format {
        OutputFormat::Json => output::format_json(&report),
        OutputFormat::Table => output::format_table(&report),
    };
    println!("{rendered}");
    Ok(())
}

fn read_sql(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read SQL from stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(feature = "postgres-catalog")]
fn resolve_catalog(args: &Args) -> Result<Box<dyn CatalogProvider>> {
    use lineage_core::NullCatalogProvider as Null;

    let Some(dsn) = args.dsn.as_ref() else {
        return Ok(Box::new(Null));
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start catalog connection runtime")?;

    let provider = runtime
        .block_on(lineage_core::udf::postgres::PgCatalogProvider::connect(dsn))
        .context("failed to connect to the Postgres catalog")?;

    // Keep the runtime alive for the duration of the process: `PgCatalogProvider`
    // drives every later `fetch_body` call through the `Handle` it captured at
    // connect time, and that handle stops working once its runtime is dropped.
    std::mem::forget(runtime);

    Ok(Box::new(provider))
}
