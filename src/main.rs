use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use comusic_server::letters::{DeliveryService, SelectionPolicyKind};
use comusic_server::server::{metrics, run_server, RequestsLoggingLevel};
use comusic_server::store::{ComusicStore, SqliteComusicStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite database file.
    #[clap(value_parser = parse_path)]
    pub db_path: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// How queued letters pick their receiver.
    #[clap(long, value_enum, default_value_t = SelectionPolicyKind::LeastLoaded)]
    pub selection_policy: SelectionPolicyKind,

    /// Interval in seconds between delivery sweeps for queued letters.
    /// Set to 0 to disable the background sweep.
    #[clap(long, default_value_t = 60)]
    pub sweep_interval_sec: u64,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!("Opening SQLite database at {:?}...", cli_args.db_path);
    let store: Arc<dyn ComusicStore> = Arc::new(SqliteComusicStore::new(&cli_args.db_path)?);

    info!("Initializing metrics...");
    metrics::init_metrics();

    // Background sweep: retries queued letters whenever inbox capacity or
    // new signups make delivery possible again.
    if cli_args.sweep_interval_sec > 0 {
        let sweep_store = store.clone();
        let policy_kind = cli_args.selection_policy;
        let interval = Duration::from_secs(cli_args.sweep_interval_sec);

        info!(
            "Delivery sweep enabled: every {}s with {:?} policy",
            cli_args.sweep_interval_sec, policy_kind
        );

        tokio::spawn(async move {
            let delivery = DeliveryService::new(sweep_store.clone(), policy_kind.build());
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match delivery.sweep_queued(Utc::now()) {
                    Ok(_) => match sweep_store.queued_letter_ids() {
                        Ok(queued) => metrics::set_queued_letters(queued.len()),
                        Err(e) => error!("Failed to count queued letters: {}", e),
                    },
                    Err(e) => error!("Delivery sweep failed: {}", e),
                }
            }
        });
    }

    run_server(
        store,
        cli_args.selection_policy.build(),
        cli_args.logging_level,
        cli_args.port,
        cli_args.frontend_dir_path,
    )
    .await
}
