//! audiomatch - audio fingerprint matching server and CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use audiomatch_engine::{EngineContext, IngestRequest, Tier};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod server;

/// audiomatch - match audio clips against a reference library.
///
/// Reference clips are embedded and stored long-term; query clips are
/// matched against them and logged short-term.
///
/// Configuration is stored in ~/.audiomatch/config.yaml.
#[derive(Parser)]
#[command(name = "audiomatch")]
#[command(about = "Audio embedding matching server and CLI")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.audiomatch/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Listen address, "host:port" or ":port"
        #[arg(long)]
        addr: Option<String>,
    },
    /// Embed a WAV file and store it
    Ingest {
        file: PathBuf,
        /// long_term (reference) or short_term (query log)
        #[arg(long, default_value = "long_term")]
        tier: Tier,
        /// Explicit id; auto-assigned when omitted
        #[arg(long)]
        id: Option<String>,
    },
    /// Match a WAV file against the references
    Match { file: PathBuf },
    /// Drop and recreate every collection
    Reset,
    /// Show collection sizes and stored filenames
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cfg = config::load_config(cli.config.as_deref())?;
    tracing::debug!(path = %cfg.path().display(), "config loaded");
    let engine = cfg.build_engine()?;

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| cfg.server.addr.clone());
            let limit = cfg.server.max_upload_mb * 1024 * 1024;
            server::serve(&addr, Arc::new(engine), limit).await
        }
        Commands::Ingest { file, tier, id } => {
            let receipt = engine
                .ingest(IngestRequest {
                    tier,
                    audio: read_file(&file)?,
                    filename: file_name(&file),
                    id,
                })
                .await?;
            print_json(&receipt)
        }
        Commands::Match { file } => {
            let audio = read_file(&file)?;
            let outcome = engine.match_audio(&audio, file_name(&file).as_deref()).await?;
            match &outcome.best {
                Some(best) => println!(
                    "match: id={} distance={:.4} filename={}",
                    best.id,
                    best.distance,
                    best.filename.as_deref().unwrap_or("-")
                ),
                None => println!("no match"),
            }
            println!("logged as query {}", outcome.query_id);
            Ok(())
        }
        Commands::Reset => reset(&engine).await,
        Commands::List => {
            print_json(&engine.counts()?)?;
            for name in engine.list_filenames().await? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn reset(engine: &EngineContext) -> anyhow::Result<()> {
    let report = engine.reset().await;
    print_json(&report)?;
    if !report.is_complete() {
        anyhow::bail!("reset incomplete");
    }
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read {}", path.display()))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
