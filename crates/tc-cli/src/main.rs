mod server;
mod settings;
mod stream;

use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};
use tc_core::{ClusterMode, TextClust, render_summaries};

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "textclust", about = "Online text stream clustering CLI and MCP server")]
struct Cli {
    /// Config file (TOML). Falls back to $TEXTCLUST_CONFIG, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster a JSON-lines stream of records and print the result
    Run {
        /// Input file, one JSON record per line
        input: PathBuf,

        /// Cluster level to list: micro or macro
        #[arg(long, default_value = "micro")]
        mode: ClusterMode,

        /// Number of clusters to list
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Number of terms shown per cluster
        #[arg(long, default_value_t = 5)]
        terms: usize,

        /// Print the cluster assigned to every record
        #[arg(long)]
        assignments: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Start MCP server on stdio transport
    Serve,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Serve => cmd_serve(settings).await,
        Commands::Run {
            input,
            mode,
            top,
            terms,
            assignments,
        } => cmd_run(settings, input, *mode, *top, *terms, *assignments),
        Commands::Config => cmd_config(&settings),
    }
}

async fn cmd_serve(settings: Settings) -> Result<()> {
    tracing::info!("starting MCP server");
    let server = server::TextClustServer::new(settings).context("invalid clustering config")?;
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}

fn cmd_run(
    settings: Settings,
    input: &Path,
    mode: ClusterMode,
    top: usize,
    terms: usize,
    assignments: bool,
) -> Result<()> {
    let mut engine = TextClust::new(settings.clustering).context("invalid clustering config")?;
    let file = std::fs::File::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?;

    let report = stream::run_stream(&mut engine, BufReader::new(file), &settings.tokenizer)?;

    if assignments {
        for a in &report.assignments {
            println!(
                "{}\t{}\t{}",
                a.line,
                a.record_id.as_deref().unwrap_or("-"),
                a.cluster
            );
        }
    }

    let stats = engine.stats();
    println!(
        "learned {} records ({} skipped), {} micro clusters",
        report.learned, report.skipped, stats.clusters
    );
    let summaries = engine.top_clusters(top, terms, mode);
    print!("{}", render_summaries(mode, &summaries));
    Ok(())
}

fn cmd_config(settings: &Settings) -> Result<()> {
    settings
        .clustering
        .validate()
        .context("invalid clustering config")?;
    print!("{}", settings.to_toml()?);
    Ok(())
}
