//! Session String Generator Bot
//!
//! Single-binary service that:
//! 1. Long-polls the Telegram Bot API for operator messages
//! 2. Walks each operator through an interactive login against the auth
//!    gateway
//! 3. Hands the exported session string back in the private chat
//! 4. Serves liveness, health and Prometheus metrics over HTTP

mod config;
mod delivery;
mod error;
mod metrics;
mod router;
mod telegram;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use auth_gateway::GatewayBackend;
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use login_flow::{Coordinator, spawn_expiry_task};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::telegram::TelegramClient;

/// How long in-flight HTTP requests get after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long queued logins and pending replies get to go out after the HTTP
/// side has stopped.
const REPLY_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How often idle logins are swept.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

const POLL_BACKOFF_MIN: Duration = Duration::from_secs(1);
const POLL_BACKOFF_MAX: Duration = Duration::from_secs(60);

const MAX_HTTP_CONNECTIONS: usize = 64;

/// Shared state for the HTTP handlers
#[derive(Clone)]
struct AppState {
    coordinator: Arc<Coordinator>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(alive_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(MAX_HTTP_CONNECTIONS))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filtered by LOG_LEVEL or RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting session-generator-bot");

    let prometheus = metrics::install_recorder();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, reading configuration from environment"),
    }

    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;
    let settings = config.login_settings();

    info!(
        operators = config.bot.operators.len(),
        gateway_url = %config.gateway_url(),
        port = config.http.port,
        interactive_credentials = settings.interactive_credentials(),
        "configuration loaded"
    );

    let http = reqwest::Client::new();
    let telegram = TelegramClient::new(http.clone(), &config.bot.api_url, config.bot_token());
    let me = telegram
        .get_me()
        .await
        .context("failed to reach the Telegram Bot API, check BOT_TOKEN")?;
    info!(bot_id = me.id, username = ?me.username, "bot identity verified");

    let backend = GatewayBackend::new(http, config.gateway_url(), config.gateway_timeout());

    let (replies_tx, replies_rx) = tokio::sync::mpsc::unbounded_channel();
    let coordinator = Arc::new(Coordinator::new(Arc::new(backend), settings, replies_tx));

    let delivery = tokio::spawn(delivery::run(telegram.clone(), replies_rx));
    let expiry = spawn_expiry_task(coordinator.clone(), EXPIRY_SWEEP_INTERVAL);
    let router = router::Router::new(coordinator.clone(), telegram.clone(), &config.bot.operators);
    let poller = tokio::spawn(poll_updates(telegram, router));

    let app = build_router(AppState {
        coordinator,
        started_at: Instant::now(),
        prometheus,
    });

    let listen_addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "http listener ready");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    // Stop taking new work first, then let the HTTP side drain. Dropping the
    // router closes the dispatch queues; they finish what is already queued.
    poller.abort();
    expiry.abort();
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server).await {
        Ok(Ok(Ok(()))) => info!("http server stopped"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }
    drain_replies(delivery, REPLY_DRAIN_TIMEOUT).await;

    info!("shutdown complete");
    Ok(())
}

/// Long-poll Telegram forever, backing off on errors.
async fn poll_updates(telegram: TelegramClient, router: router::Router) {
    let mut offset: Option<i64> = None;
    let mut backoff = POLL_BACKOFF_MIN;

    loop {
        match telegram.get_updates(offset).await {
            Ok(updates) => {
                backoff = POLL_BACKOFF_MIN;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    router.handle(update).await;
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_in_secs = backoff.as_secs(),
                    "polling for updates failed"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(POLL_BACKOFF_MAX);
            }
        }
    }
}

/// Wait for the delivery task to send what is left in the reply channel. It
/// ends once the dispatch queues and the HTTP state have dropped their
/// coordinator handles.
async fn drain_replies(mut delivery: JoinHandle<()>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, &mut delivery).await {
        Ok(Ok(())) => {
            info!("pending replies delivered");
            true
        }
        Ok(Err(e)) => {
            error!(error = %e, "delivery task panicked");
            false
        }
        Err(_) => {
            delivery.abort();
            warn!(
                drain_timeout_secs = timeout.as_secs(),
                "replies still pending at shutdown, dropping them"
            );
            false
        }
    }
}

async fn alive_handler() -> &'static str {
    "Session Generator Bot is alive!"
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "active_logins": state.coordinator.active_sessions(),
    });
    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
