use aid_service::{
    build_router,
    config::{AppConfig, SessionBackend},
    db,
    services::{
        AuthService, Database, IdentityStore, LifecycleStore, MemorySessionStore,
        RedisSessionStore, SessionStore, TokenService,
    },
    workers, AppState,
};
use service_core::error::AppError;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AppConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting aid service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
    let database = Arc::new(Database::new(pool));

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    let sessions: Arc<dyn SessionStore> = match config.sessions.backend {
        SessionBackend::Memory => {
            let store = Arc::new(MemorySessionStore::new());
            handles.push(workers::spawn_session_janitor(
                store.clone(),
                config.sessions.sweep_interval(),
                shutdown.clone(),
            ));
            store as Arc<dyn SessionStore>
        }
        SessionBackend::Redis => {
            let url = config.sessions.redis_url.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("REDIS_URL is required for redis sessions"))
            })?;
            Arc::new(RedisSessionStore::new(url).await?) as Arc<dyn SessionStore>
        }
    };
    tracing::info!(backend = ?config.sessions.backend, "Session store initialized");

    let tokens = TokenService::new(&config.sessions)?;
    let identities: Arc<dyn IdentityStore> = database.clone();
    let auth_service = AuthService::new(
        identities.clone(),
        sessions.clone(),
        tokens,
        config.sessions.session_ttl(),
    );

    let lifecycle: Arc<dyn LifecycleStore> = database;
    handles.extend(workers::spawn_reapers(
        lifecycle,
        &config.reapers,
        shutdown.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        auth_service,
        identities,
        sessions,
    };
    let app = build_router(state);

    let addr = config.common.socket_addr();
    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, waiting for background workers");
    shutdown.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Background worker panicked");
        }
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
