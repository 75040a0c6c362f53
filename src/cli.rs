/*!
chartsql Command Line Interface

Builds chart queries from a JSON chart configuration and renders them against DuckDB.
*/

use anyhow::Context;
use chartsql::reader::DuckDBReader;
use chartsql::{api, ChartConfiguration, LayoutOptions, VERSION};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chartsql")]
#[command(about = "Categorical aggregation queries and Sankey layouts for DuckDB tables")]
#[command(version = VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the chart query without running it
    Sql {
        /// Chart configuration (JSON)
        #[arg(long)]
        config: PathBuf,
    },

    /// Run the chart query and print the chart as JSON
    Render {
        /// Chart configuration (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Flow layout options (JSON)
        #[arg(long)]
        options: Option<PathBuf>,

        /// Data source connection string
        #[arg(long, default_value = "duckdb://memory")]
        reader: String,

        /// Load CSV, Parquet or JSON files as tables before rendering
        #[arg(long = "load-data", num_args = 1..)]
        load_data: Vec<String>,

        /// Output file path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Show verbose output (generated SQL, timings)
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "chartsql=debug" } else { "chartsql=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sql { config } => {
            init_tracing(false);
            let config: ChartConfiguration = read_json(&config)?;
            let prepared = api::prepare(&config)?;
            println!("{}", prepared.sql());
        }

        Commands::Render {
            config,
            options,
            reader,
            load_data,
            output,
            verbose,
        } => {
            init_tracing(verbose);
            let config: ChartConfiguration = read_json(&config)?;
            let options: LayoutOptions = match options {
                Some(path) => read_json(&path)?,
                None => LayoutOptions::default(),
            };
            cmd_render(&config, &options, &reader, &load_data, output.as_deref())?;
        }
    }

    Ok(())
}

fn cmd_render(
    config: &ChartConfiguration,
    options: &LayoutOptions,
    reader: &str,
    load_data: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let reader = DuckDBReader::from_connection_string(reader)?;
    for file in load_data {
        reader.load_file(file)?;
    }

    let rendered = api::render(config, &reader, options)?;
    let json = rendered.to_json()?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Chart written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
