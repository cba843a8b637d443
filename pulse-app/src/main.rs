use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_common::observability::{init_logging, LogConfig};
use pulse_config::{PulseConfig, PulseConfigLoader, DEFAULT_CONFIG_FILE};
use pulse_web::AppState;
use tokio_util::sync::CancellationToken;

mod wiring;

#[derive(Debug, Parser)]
#[command(name = "sentiment-pulse", version, about = "Reddit sentiment for a company name")]
struct Cli {
    /// Configuration file; a missing default file is ignored.
    #[arg(long, global = true, env = "PULSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Analyze one name and print the report as JSON.
    Query {
        name: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Lowest-priority layer: the conventional Reddit variables, overridable by any file.
const REDDIT_ENV_DEFAULTS: &str = r#"
reddit:
  client_id: "${REDDIT_CLIENT_ID}"
  client_secret: "${REDDIT_CLIENT_SECRET}"
"#;

fn load_config(path: Option<&PathBuf>) -> Result<PulseConfig> {
    let base = PulseConfigLoader::new().with_yaml_str(REDDIT_ENV_DEFAULTS);
    let loader = match path {
        Some(p) => base.with_file(p),
        None => base.with_optional_file(DEFAULT_CONFIG_FILE),
    };
    loader.load().context("loading configuration")
}

fn warn_missing_credentials(cfg: &PulseConfig) {
    if cfg.reddit.credentials().is_none() {
        tracing::warn!(
            "Reddit client secret not set; using anonymous access. \
             Set REDDIT_CLIENT_ID/REDDIT_CLIENT_SECRET (see https://www.reddit.com/prefs/apps)."
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let cfg = load_config(cli.config.as_ref())?;

    let log_path = init_logging(LogConfig {
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.emit_stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
        ..LogConfig::default()
    })?;
    tracing::info!(log = %log_path.display(), version = ?cfg.version, "sentiment-pulse.start");
    warn_missing_credentials(&cfg);

    let pipeline = Arc::new(wiring::build_pipeline(&cfg)?);

    match cli.command {
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| cfg.server.host.clone());
            let port = port.unwrap_or(cfg.server.port);

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("ctrl-c received, shutting down");
                }
                signal.cancel();
            });

            pulse_web::serve(AppState::new(pipeline), &host, port, shutdown).await
        }
        Command::Query { name, limit } => {
            let limit = limit.unwrap_or_else(|| pipeline.fetch_limit());
            let report = pipeline.run_with_limit(&name, limit).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
