//! Nestquery CLI
//!
//! Command-line interface for running queries over JSON files:
//! - Run a query description
//! - Discover the columns of a collection
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use nestquery::config::{generate_default_config, Config, LoggingConfig, OutputFormat};
use nestquery::index::columns;
use nestquery::output::render;
use nestquery::query::{parse_query_with, QueryExecutor, Source};
use nestquery::record::ValueKind;

#[derive(Parser)]
#[command(name = "nestquery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query nested JSON documents")]
#[command(long_about = "Nestquery filters, projects, sorts and windows collections of nested JSON records.\nPredicates drill into nested arrays one level at a time.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format, overriding the config
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a JSON query description
    Run {
        /// Query file, or "-" for stdin
        query: PathBuf,
        /// JSON array of records to use as the query's "from"
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// List the top-level fields of a JSON array of records
    Columns {
        /// Path to the JSON file
        data: PathBuf,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = with_bootstrap_logging(|| match &cli.config {
        Some(path) => Config::load_with_env(path),
        None => Ok(Config::load_default()),
    })?;
    if let Some(format) = cli.format {
        config.output.format = format;
    }

    init_logging(&config.logging);

    match cli.command {
        Commands::Run { query, data } => {
            let text = read_input(&query)?;
            let description: Value = serde_json::from_str(&text)
                .with_context(|| format!("Query {:?} is not valid JSON", query))?;
            let mut parsed = parse_query_with(&description, config.engine.strict)?;

            if let Some(path) = data {
                parsed.from = Source::Records(read_records(&path)?);
            }

            let executor = QueryExecutor::new(config.engine.clone());
            let output = executor.execute(parsed)?;
            tracing::info!(
                rows = output.len(),
                scanned = output.records_scanned,
                elapsed_ms = output.execution_time_ms,
                "query finished"
            );

            print!("{}", render(&output.rows, &config.output)?);
        }

        Commands::Columns { data } => {
            let records = read_records(&data)?;
            for name in columns(&records) {
                println!("{}", name);
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", content);
                }
            }
        }
    }

    Ok(())
}

/// Run `f` under a stderr subscriber used until the configured one exists,
/// so messages from config discovery are not dropped.
fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nestquery=warn"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::with_default(subscriber, f)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nestquery={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read query from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }
}

fn read_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    match serde_json::from_str::<Value>(&text).with_context(|| format!("{:?} is not valid JSON", path))? {
        Value::Array(records) => Ok(records),
        other => bail!(
            "{:?} must contain a JSON array of records, found a {} value",
            path,
            ValueKind::of(&other)
        ),
    }
}
