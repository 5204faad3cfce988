//! jamscan daemon — entry point for running the sync service.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use jamscan_api::{ApiServer, ApiState};
use jamscan_store::{BlockRecordStore, EndpointStore, MetaStore};
use jamscan_store_lmdb::LmdbStore;
use jamscan_sync::{init_logging, EndpointRegistry, LogFormat, SyncConfig, SyncService};

#[derive(Parser)]
#[command(name = "jamscan-daemon", about = "JAM chain explorer sync daemon")]
struct Cli {
    /// Node WebSocket endpoint (used when no active endpoint is persisted).
    #[arg(long, env = "JAMSCAN_ENDPOINT")]
    endpoint: Option<String>,

    /// Data directory for the record store.
    #[arg(long, default_value = "./jamscan_data", env = "JAMSCAN_DATA_DIR")]
    data_dir: PathBuf,

    /// Enable the read-only HTTP API.
    #[arg(long, default_value_t = true, env = "JAMSCAN_ENABLE_API")]
    api: bool,

    /// HTTP API port.
    #[arg(long, env = "JAMSCAN_API_PORT")]
    api_port: Option<u16>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "JAMSCAN_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "JAMSCAN_LOG_FORMAT")]
    log_format: String,

    /// Path to a TOML configuration file. If provided, file settings are
    /// used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the sync daemon.
    Run,
}

fn load_config(cli: &Cli) -> SyncConfig {
    let file_config: Option<SyncConfig> = cli.config.as_ref().and_then(|path| {
        match SyncConfig::from_toml_file(&path.display().to_string()) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("failed to load config file {}: {e}", path.display());
                None
            }
        }
    });

    let mut config = file_config.unwrap_or_default();
    if let Some(ref endpoint) = cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    config.data_dir = cli.data_dir.clone();
    config.enable_api = cli.api;
    if let Some(port) = cli.api_port {
        config.api_port = port;
    }
    config.log_level = cli.log_level.clone();
    config.log_format = cli.log_format.clone();
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli);

    let format = config
        .log_format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Human);
    init_logging(format, &config.log_level);

    match cli.command {
        Command::Run => run(config).await,
    }
}

async fn run(config: SyncConfig) -> anyhow::Result<()> {
    tracing::info!(
        endpoint = %config.endpoint,
        data_dir = %config.data_dir.display(),
        api = %if config.enable_api {
            config.api_port.to_string()
        } else {
            "off".to_string()
        },
        "starting jamscan daemon"
    );

    let store = Arc::new(LmdbStore::open(&config.data_dir, config.map_size)?);
    let endpoints: Arc<dyn EndpointStore + Send + Sync> = store.clone();
    let meta: Arc<dyn MetaStore + Send + Sync> = store.clone();
    let registry = Arc::new(EndpointRegistry::open(endpoints, meta, &config.endpoint)?);
    let records: Arc<dyn BlockRecordStore + Send + Sync> = store.clone();

    let enable_api = config.enable_api;
    let api_port = config.api_port;
    let mut service = SyncService::new(config, Arc::clone(&records), Arc::clone(&registry));
    let shutdown = service.shutdown_controller();
    service.start();

    let api_handle = if enable_api {
        let state = ApiState {
            records,
            registry,
            status: service.status(),
            now: service.now(),
            metrics: service.metrics(),
        };
        let server = ApiServer::new(api_port, state);
        let shutdown_rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.start(shutdown_rx).await {
                tracing::error!(error = %e, "http api server exited");
            }
        }))
    } else {
        None
    };

    shutdown.wait_for_signal().await;

    tracing::info!("shutdown signal received, stopping");
    service.stop().await?;
    if let Some(handle) = api_handle {
        let _ = handle.await;
    }

    tracing::info!("jamscan daemon exited cleanly");
    Ok(())
}
