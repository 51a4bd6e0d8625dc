//! Notes API Server Entry Point
//!
//! Loads `.env`, initializes logging, connects storage and the key-value
//! store, and serves the Axum router until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use notes_api::telemetry::{init_tracer, TelemetryConfig};
use notes_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, StorageBackend};
use notes_storage::{DbConfig, InMemoryStorage, KvStore, MemoryKv, PgStorage, RedisKv, Storage};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let dotenv = dotenvy::dotenv();

    let telemetry_config = TelemetryConfig::from_env();
    init_tracer(&telemetry_config)?;

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env"),
    }

    let api_config = ApiConfig::from_env()?;
    let auth_config = AuthConfig::from_env();

    let storage = connect_storage(api_config.storage_backend).await?;
    let kv = connect_kv(api_config.redis_url.as_deref()).await;

    let addr = api_config.bind_addr;
    let state = AppState::new(storage, kv, auth_config, api_config);
    let app = create_api_router(state)?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting notes API server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn connect_storage(backend: StorageBackend) -> ApiResult<Arc<dyn Storage>> {
    match backend {
        StorageBackend::Postgres => {
            let db_config = DbConfig::from_env();
            let storage = PgStorage::from_config(&db_config)?;
            storage.ensure_schema().await?;
            tracing::info!(
                host = %db_config.host,
                database = %db_config.dbname,
                pool_size = storage.pool_size(),
                "Connected to Postgres"
            );
            Ok(Arc::new(storage))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }
}

/// Redis when configured and reachable, process memory otherwise.
async fn connect_kv(redis_url: Option<&str>) -> Arc<dyn KvStore> {
    let Some(url) = redis_url else {
        tracing::info!("NOTES_REDIS_URL not set; cache and rate limits are in-process");
        return Arc::new(MemoryKv::new());
    };

    match RedisKv::connect(url).await {
        Ok(redis) => {
            tracing::info!("Connected to Redis");
            Arc::new(redis)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unreachable; falling back to in-process cache and rate limits");
            Arc::new(MemoryKv::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
