//! yaktoon-api - HTTP backend entry point
//!
//! Serves the community, catalog, purchase, messaging, dashboard, AI chat and
//! student record analysis endpoints over a Redis-backed store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yaktoon_api::{build_router, AppState};
use yaktoon_common::config::{load_toml_config, AppConfig, CliOverrides};
use yaktoon_common::events::EventBus;
use yaktoon_common::store::{MemoryStore, RedisStore};
use yaktoon_common::Store;
use yaktoon_medsky::llm::{ChatModel, OpenAiClient};
use yaktoon_medsky::pdf::{LlamaCloudClient, PdfConfig, PdfParser, UnconfiguredParser};
use yaktoon_medsky::MedskyService;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Command-line arguments for yaktoon-api
#[derive(Parser, Debug)]
#[command(name = "yaktoon-api")]
#[command(about = "Education platform API server")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Redis connection URL
    #[arg(long)]
    redis_url: Option<String>,

    /// Keep all data in process memory instead of Redis
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yaktoon_api=debug,yaktoon_medsky=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting yaktoon-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load config")?;
    let config = AppConfig::resolve(
        &CliOverrides {
            port: args.port,
            redis_url: args.redis_url.clone(),
        },
        &toml_config,
    );

    let store: Arc<dyn Store> = if args.memory_store {
        warn!("Using in-memory store, data is lost on shutdown");
        Arc::new(MemoryStore::new())
    } else {
        let redis = RedisStore::connect(&config.redis_url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
        Arc::new(redis)
    };

    let analysis_model: Arc<dyn ChatModel> = Arc::new(
        OpenAiClient::new(
            config.llm.api_key.clone(),
            config.llm.base_url.clone(),
            config.llm.analysis_model.clone(),
        )
        .context("Failed to build analysis model client")?,
    );
    let chat_model: Arc<dyn ChatModel> = Arc::new(
        OpenAiClient::new(
            config.llm.api_key.clone(),
            config.llm.base_url.clone(),
            config.llm.chat_model.clone(),
        )
        .context("Failed to build chat model client")?,
    );

    let pdf: Arc<dyn PdfParser> = match config.llama.api_key.as_deref() {
        Some(key) => Arc::new(
            LlamaCloudClient::new(PdfConfig::new(key, config.llama.base_url.clone()))
                .context("Failed to build LlamaCloud client")?,
        ),
        None => {
            warn!("LLAMA_API_KEY not configured, record uploads will be refused");
            Arc::new(UnconfiguredParser)
        }
    };

    let credential_errors = config.credential_errors();
    for problem in &credential_errors {
        warn!("Configuration: {}", problem);
    }

    let events = EventBus::default();
    let medsky = Arc::new(
        MedskyService::new(store.clone(), pdf, analysis_model, events.clone())
            .with_credential_errors(credential_errors)
            .with_session_ttl_hours(config.session_ttl_hours),
    );
    spawn_session_sweeper(medsky.clone(), config.session_ttl_hours);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(store, medsky, chat_model, events, config);
    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Evict in-memory analysis sessions older than the session TTL
fn spawn_session_sweeper(medsky: Arc<MedskyService>, max_age_hours: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            medsky.cleanup_old_sessions(max_age_hours).await;
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
