use argus_core::forge::GithubForge;
use argus_core::sync::{SyncConfig, SyncScheduler};
use argus_core::{PostgresStore, StoreGateway};
use argus_server::config::Config;
use argus_server::{AppState, routes};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Store connection attempts before giving up at startup.
const STORE_CONNECT_ATTEMPTS: u32 = 5;

/// Startup backoff cap.
const STORE_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Command line arguments for the Argus proctoring server
#[derive(Parser, Debug)]
#[command(name = "argus-server")]
#[command(about = "Real-time proctoring engine for programming contests")]
struct Args {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| {
                    std::env::var("LOG_LEVEL")
                        .map(tracing_subscriber::EnvFilter::new)
                })
                .unwrap_or_else(|_| {
                    "argus_server=debug,argus_core=debug,tower_http=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    if let Some(host) = args.host {
        config.server_host = host;
    }
    info!("Server configuration loaded");

    let store = connect_store(&config.database_url).await?;
    store.initialize_schema().await?;
    info!("Database initialized successfully");

    let mut state = AppState::new(store.clone(), config.clone());

    // The sync scheduler only runs with a source token; without one the
    // engine still ingests and scores telemetry.
    match &config.source_token {
        Some(token) => {
            let forge = GithubForge::new(&config.source_api_base, token)
                .map_err(|e| anyhow::anyhow!("forge client init failed: {e}"))?;
            let scheduler = Arc::new(SyncScheduler::new(
                store,
                Arc::new(forge),
                state.fabric.clone(),
                SyncConfig {
                    interval: Duration::from_secs(config.sync_interval_min * 60),
                    similarity_threshold: config.similarity_threshold,
                    ..Default::default()
                },
            ));
            let _ = scheduler.clone().start();
            state = state.with_sync(scheduler);
        }
        None => {
            warn!("SOURCE_TOKEN not set - source-history monitoring is disabled");
        }
    }

    let app = routes::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!(
        "Starting Argus proctoring server on {}:{}",
        config.server_host, config.server_port
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // ConnectInfo feeds the per-participant rate-limit IP fallback.
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await?;

    Ok(())
}

/// Connect to the store with exponential backoff. Exhausting the retries
/// is an unrecoverable startup failure (exit code 1).
async fn connect_store(database_url: &str) -> anyhow::Result<Arc<dyn StoreGateway>> {
    let mut backoff = Duration::from_secs(1);
    for attempt in 1..=STORE_CONNECT_ATTEMPTS {
        match PostgresStore::connect(database_url).await {
            Ok(store) => {
                info!("Successfully connected to PostgreSQL");
                return Ok(Arc::new(store));
            }
            Err(e) if attempt < STORE_CONNECT_ATTEMPTS => {
                warn!(
                    attempt,
                    "store connection failed ({e}), retrying in {}s",
                    backoff.as_secs()
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(STORE_BACKOFF_CAP);
            }
            Err(e) => {
                error!("store unreachable after {STORE_CONNECT_ATTEMPTS} attempts: {e}");
                return Err(anyhow::anyhow!("database connection failed: {e}"));
            }
        }
    }
    unreachable!("retry loop returns on success or final failure")
}
