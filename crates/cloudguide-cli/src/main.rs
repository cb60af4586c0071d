//! `cloudguide`: serve the HTTP surface, ingest a directory, or ask once.

mod http;
mod ingest;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cloudguide_runtime::{CloudGuideConfig, RouterHandle, RuntimeBuilder};

#[derive(Parser, Debug)]
#[command(name = "cloudguide", version, about = "Cloud pricing and architecture assistant")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Overrides `http.bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Chunk, embed and store every .txt, .md and .json file under a directory
    Ingest(IngestArgs),

    /// Route one query and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct IngestArgs {
    #[arg(long)]
    dir: PathBuf,

    #[arg(long, default_value = "manual")]
    doc_id_prefix: String,

    /// Chunks per embedding request
    #[arg(long, default_value_t = 64)]
    batch: usize,

    /// Target chunk size in characters
    #[arg(long, default_value_t = 800)]
    chunk: usize,

    #[arg(long, default_value_t = 150)]
    overlap: usize,
}

impl From<IngestArgs> for ingest::IngestOptions {
    fn from(args: IngestArgs) -> Self {
        Self {
            dir: args.dir,
            doc_id_prefix: args.doc_id_prefix,
            batch: args.batch,
            chunk: args.chunk,
            overlap: args.overlap,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.http.bind.clone());
            let runtime = RuntimeBuilder::new(config).build().await?;
            info!("CloudGuide v{} starting", env!("CARGO_PKG_VERSION"));
            http::serve(http::AppState::from_runtime(&runtime), &bind).await?;
            runtime.shutdown().await;
        }
        Command::Ingest(args) => {
            let summary = ingest::run(&config, &args.into()).await?;
            if !summary.failed.is_empty() {
                bail!("{} document(s) failed to ingest", summary.failed.len());
            }
        }
        Command::Ask { text } => {
            let runtime = RuntimeBuilder::new(config).build().await?;
            let outcome = ask_once(
                runtime.router(),
                text.join(" "),
                runtime.config().timeouts.http_to_router,
            )
            .await;
            runtime.shutdown().await;
            match outcome {
                Ok(line) => println!("{}", line),
                Err(message) => {
                    println!("{}", message);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// `[SOURCE] answer`, or the same message the HTTP API would return.
async fn ask_once(router: &RouterHandle, query: String, timeout: Duration) -> Result<String, String> {
    http::route(router, "cli", query, timeout)
        .await
        .map(|answer| format!("[{}] {}", answer.source, answer.text))
        .map_err(|(_, message)| message)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&std::path::Path>) -> Result<CloudGuideConfig> {
    let config = match path {
        Some(path) => CloudGuideConfig::from_file(path)?,
        None => CloudGuideConfig::default(),
    };
    let config = config.apply_env()?;
    config.validate()?;
    Ok(config)
}
