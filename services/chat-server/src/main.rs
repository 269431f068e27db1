//! Trading chat server
//!
//! Single-binary Rust service that:
//! 1. Serves the static site
//! 2. Answers chat messages through Gemini, failing over across API keys
//! 3. Stores contact form submissions in a capped JSON file
//! 4. Exposes /health and Prometheus /metrics
//!
//! `--ask "<message>"` answers one message on stdout and exits.

mod api;
mod config;
mod contact;
mod error;
mod metrics;
mod strategies;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use failover::{ChatFacade, CredentialPool, Dispatcher};
use gemini::GeminiBackend;
use metrics_exporter_prometheus::PrometheusHandle;
use provider::Backend;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ServerConfig};
use crate::contact::ContactStore;
use crate::metrics::ServiceMetrics;

/// Time allowed for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    chat: ChatFacade,
    contacts: Arc<ContactStore>,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// API routes take precedence; `/` serves the index page and every other
/// path falls through to the static directory.
fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let index = server.static_dir.join(&server.index_file);
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/chat", post(api::chat_handler))
        .route("/api/test", get(api::test_handler))
        .route("/api/strategies", get(api::strategies_handler))
        .route("/contact", post(contact::contact_handler))
        .route_service("/", ServeFile::new(index))
        .fallback_service(ServeDir::new(&server.static_dir))
        .layer(CorsLayer::permissive())
        .layer(tower::limit::ConcurrencyLimitLayer::new(server.max_connections))
        .with_state(state)
}

/// Wire the pool, backend and persona into the chat facade.
fn build_chat(config: &Config) -> Result<ChatFacade> {
    let pool = CredentialPool::from_keys(config.backend.api_keys.iter().map(|k| k.expose()));
    let backend = GeminiBackend::new(
        config.backend.base_url.clone(),
        config.backend.model.clone(),
        Duration::from_secs(config.backend.timeout_secs),
    )
    .context("failed to build gemini backend")?;
    let backend: Arc<dyn Backend> = Arc::new(backend);
    let dispatcher = Dispatcher::new(Arc::new(pool), backend);
    Ok(ChatFacade::new(config.chat.persona(), dispatcher))
}

/// Value following `flag` on the command line, if any.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = Config::resolve_path(flag_value(&args, "--config"));
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        model = %config.backend.model,
        credentials = config.backend.api_keys.len(),
        static_dir = %config.server.static_dir.display(),
        "configuration loaded"
    );

    let chat = build_chat(&config)?;

    if let Some(message) = flag_value(&args, "--ask") {
        println!("{}", chat.get_response_blocking(message));
        return Ok(());
    }

    let prometheus = match metrics::install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "failed to install prometheus recorder, /metrics will be empty");
            metrics::detached_handle()
        }
    };

    let contacts = Arc::new(ContactStore::new(
        config.contact.messages_file.clone(),
        config.contact.max_messages,
    ));
    contacts.init().await.with_context(|| {
        format!(
            "failed to prepare contact store at {}",
            config.contact.messages_file.display()
        )
    })?;

    let state = AppState {
        chat,
        contacts,
        metrics: ServiceMetrics::new(),
        prometheus,
    };
    let app = build_router(state, &config.server);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // Drain timer starts at signal receipt, not at server start.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: 200 with at least one credential, 503 when every chat
/// request is bound to get the fallback answer.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.chat.dispatcher();
    let credentials = dispatcher.pool().len();
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let requests = state.metrics.requests_total.load(Ordering::Relaxed);
    let errors = state.metrics.errors_total.load(Ordering::Relaxed);

    let (status_code, status) = if credentials > 0 {
        (axum::http::StatusCode::OK, "healthy")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    api::reply(
        status_code,
        serde_json::json!({
            "status": status,
            "backend": dispatcher.backend().id(),
            "model": dispatcher.backend().model(),
            "credentials": credentials,
            "uptime_seconds": uptime,
            "requests_served": requests,
            "errors_total": errors,
        }),
    )
}

/// Prometheus metrics in text exposition format.
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
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
