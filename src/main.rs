use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use farmagenius::config::AppConfig;
use farmagenius::database::{DatabaseManager, MemoryStore, PgStore, Store};
use farmagenius::services::spawn_sweeper;
use farmagenius::{app, AppState};

#[derive(Parser)]
#[command(name = "farmagenius", version, about = "FarmaGenius API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides FARMAGENIUS_PORT / PORT)")]
        port: Option<u16>,

        #[arg(long, help = "Use the in-memory store instead of Postgres")]
        memory: bool,
    },

    #[command(about = "Apply database migrations and exit")]
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("farmagenius=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = farmagenius::config::config().clone();

    match cli.command.unwrap_or(Command::Serve { port: None, memory: false }) {
        Command::Migrate => migrate(&config).await,
        Command::Serve { port, memory } => serve(config, port, memory).await,
    }
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    DatabaseManager::migrate(&pool).await.context("failed to apply migrations")?;
    Ok(())
}

async fn serve(mut config: AppConfig, port: Option<u16>, memory: bool) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.api.port = port;
    }
    tracing::info!("Starting FarmaGenius API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = if memory {
        tracing::warn!("Using the in-memory store; data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        let pool = DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to the database")?;
        Arc::new(PgStore::new(pool))
    };

    let sweep_every = Duration::from_secs(config.api.rate_limit_sweep_secs.max(1));
    let bind_addr = format!("0.0.0.0:{}", config.api.port);

    let state = AppState::new(config, store)?;
    let sweeper = spawn_sweeper(state.rate_limiter.clone(), sweep_every);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("FarmaGenius API listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
