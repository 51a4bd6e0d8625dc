//! Health Check Endpoints
//!
//! - /health - Liveness with service identity
//! - /health/ready - Storage and key-value store reachability
//!
//! No authentication required for health endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use notes_storage::{KvStore, Storage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// TYPES
// ============================================================================

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always `ok` when the process answers
    pub status: String,
    /// RFC 3339
    pub timestamp: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Storage is fine but the key-value store is not. Caching and rate
    /// limiting are bypassed until it returns.
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_check(result: Result<u64, String>) -> Self {
        match result {
            Ok(latency) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(latency),
                error: None,
            },
            Err(e) => Self {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                error: Some(e),
            },
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub storage: ComponentHealth,
    pub kv: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct HealthState {
    pub storage: Arc<dyn Storage>,
    pub kv: Arc<dyn KvStore>,
    pub start_time: Instant,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health - Liveness check
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /health/ready - Readiness check
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Storage is unreachable", body = ReadinessResponse),
    ),
)]
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let storage = ComponentHealth::from_check(check_storage(state.storage.as_ref()).await);
    let kv = ComponentHealth::from_check(check_kv(state.kv.as_ref()).await);

    let status = match (storage.status, kv.status) {
        (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
        (HealthStatus::Healthy, _) => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    };

    let status_code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = ReadinessResponse {
        status,
        storage,
        kv,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    (status_code, Json(response))
}

async fn check_storage(storage: &dyn Storage) -> Result<u64, String> {
    let start = Instant::now();
    match storage.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Storage check failed: {}", e)),
    }
}

async fn check_kv(kv: &dyn KvStore) -> Result<u64, String> {
    let start = Instant::now();
    match kv.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Key-value store check failed: {}", e)),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router(storage: Arc<dyn Storage>, kv: Arc<dyn KvStore>, start_time: Instant) -> Router {
    let state = Arc::new(HealthState {
        storage,
        kv,
        start_time,
    });

    Router::new()
        .route("/", get(health))
        .route("/ready", get(readiness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serializes_lowercase() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded)?, "\"degraded\"");
        Ok(())
    }

    #[test]
    fn test_component_health_with_error() -> Result<(), serde_json::Error> {
        let component = ComponentHealth::from_check(Err("Connection refused".to_string()));
        assert_eq!(component.status, HealthStatus::Unhealthy);

        let json = serde_json::to_string(&component)?;
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("Connection refused"));
        assert!(!json.contains("latency_ms"));
        Ok(())
    }

    #[tokio::test]
    async fn test_health_reports_service_identity() {
        let Json(response) = health().await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.service, "notes-api");
        assert!(chrono::DateTime::parse_from_rfc3339(&response.timestamp).is_ok());
    }
}
