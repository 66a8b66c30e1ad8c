use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use biblioteca_audit::{
    DailyFileWriter, FileLogSink, LogSink, LogStream, MemoryLogSink, RetentionTask,
};
use biblioteca_db::memory::MemoryStore;
use biblioteca_db::store::{PgStore, Store};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblioteca_api::config::{LogBackend, ServerConfig, StorageBackend, DEFAULT_LOG_FILTER};
use biblioteca_api::router::build_app_router;
use biblioteca_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    // Console output always; JSON lines to the daily `general` stream when
    // logs go to files.
    let general_log = match config.log.backend {
        LogBackend::File => Some(
            DailyFileWriter::new(&config.log.dir, LogStream::General)
                .expect("Failed to open general log stream"),
        ),
        LogBackend::Memory => None,
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(general_log.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        log_sink = ?config.log.backend,
        "Loaded server configuration"
    );

    // --- Storage ---
    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

            let pool = biblioteca_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            biblioteca_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            biblioteca_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Audit sink + retention ---
    let retention_cancel = CancellationToken::new();
    let (sink, retention_handle) = match config.log.backend {
        LogBackend::File => {
            let file_sink = Arc::new(
                FileLogSink::open(&config.log.dir)
                    .await
                    .expect("Failed to open log directory"),
            );
            tracing::info!(dir = %config.log.dir.display(), "File log sink ready");

            let task = RetentionTask::new(Arc::clone(&file_sink), config.log.retention)
                .with_interval(Duration::from_secs(config.log.prune_interval_secs));
            let cancel = retention_cancel.clone();
            let handle = tokio::spawn(async move {
                task.run(cancel).await;
            });
            (file_sink as Arc<dyn LogSink>, Some(handle))
        }
        LogBackend::Memory => {
            tracing::warn!("Using in-memory log sink; audit trail is lost on restart");
            (Arc::new(MemoryLogSink::new()) as Arc<dyn LogSink>, None)
        }
    };

    // --- App state ---
    let state = AppState::new(store, sink, config.clone());

    if let Some(seed) = &config.admin {
        state
            .users
            .ensure_admin(seed)
            .await
            .expect("Failed to seed admin account");
    }

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    retention_cancel.cancel();
    if let Some(handle) = retention_handle {
        let _ = tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), handle)
            .await;
        tracing::info!("Log retention task stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
