use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onlyvalid_api::config::ServerConfig;
use onlyvalid_api::router::build_app_router;
use onlyvalid_api::state::AppState;
use onlyvalid_api::ws;
use onlyvalid_events::{JobNotifier, JobPersistence, WebhookDelivery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "onlyvalid_api=debug,onlyvalid_events=info,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = onlyvalid_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    onlyvalid_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    onlyvalid_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- App state (connections, channel registry, event bus, emitter) ---
    let state = AppState::new(pool.clone(), config.clone());
    let ws_manager = Arc::clone(&state.ws_manager);
    let registry = Arc::clone(&state.registry);

    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Event consumers ---
    let persistence_handle = tokio::spawn(JobPersistence::run(
        pool.clone(),
        state.event_bus.subscribe(),
    ));
    let notifier = JobNotifier::new(pool, Arc::new(WebhookDelivery::new()));
    let notifier_handle = tokio::spawn(notifier.run(state.event_bus.subscribe()));
    tracing::info!("Event consumers started (persistence, webhooks)");

    // --- Start server ---
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("Invalid HOST address '{}'", config.host))?,
        config.port,
    );
    let app = build_app_router(state, &config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    let shutdown_ws = Arc::clone(&ws_manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open sockets would otherwise keep the server draining.
            shutdown_ws.shutdown_all().await;
        })
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    heartbeat_handle.abort();

    // Consumers stop once every bus sender is dropped; the emitter's copy
    // goes away with the router, so bound the wait.
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    let _ = tokio::time::timeout(drain, persistence_handle).await;
    let _ = tokio::time::timeout(drain, notifier_handle).await;
    tracing::info!("Event consumers stopped");

    registry.shutdown().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
