//! REST API Routes Module
//!
//! Route handlers grouped by resource, plus router assembly:
//! - `/users/*`: registration, login, current user, admin check
//! - `/notes/*`: per-owner note CRUD (auth required)
//! - `/health/*`: liveness and readiness (public)
//! - `/ws`, `/ws/chat`, `/ws-test`: realtime channels
//! - `/metrics`, `/openapi.json`, `/swagger-ui`
//! - CORS support for browser-based clients

pub mod health;
pub mod note;
pub mod user;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::middleware::{auth_middleware, rate_limit_middleware};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};
use crate::ws::{chat_ws_handler, lobby_ws_handler, ws_test_page};

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

fn is_production(environment: &str) -> bool {
    matches!(environment.to_lowercase().as_str(), "production" | "prod")
}

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        tracing::warn!("CORS origins not configured for production; all origins are allowed. Set NOTES_CORS_ORIGINS.");
    }
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting is disabled in production. Set NOTES_RATE_LIMIT_ENABLED=true.");
    }
    Ok(())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Routes that require a bearer token.
fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(user::me))
        .route("/users/admin", get(user::admin))
        .route("/notes", get(note::list_notes).post(note::create_note))
        .route(
            "/notes/:id",
            get(note::get_note)
                .put(note::update_note)
                .delete(note::delete_note),
        )
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", axum::routing::post(user::register))
        .route("/users/login", axum::routing::post(user::login))
}

/// Assemble the complete application router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS, handles preflight requests
/// 2. Observability, tracing and metrics
/// 3. Rate limiting on every route, when enabled
/// 4. Auth, only on protected routes
///
/// Fails in production when the JWT secret is insecure.
pub fn create_api_router(state: AppState) -> ApiResult<Router> {
    state.auth.validate_for_production(&state.config.environment)?;
    if is_production(&state.config.environment) {
        validate_api_config_for_production(&state.config)?;
    }

    let protected = protected_routes()
        .route_layer(from_fn_with_state(state.auth_middleware_state(), auth_middleware));

    let ws_routes = Router::new()
        .route("/ws", get(lobby_ws_handler))
        .with_state(state.ws_lobby.clone())
        .merge(
            Router::new()
                .route("/ws/chat", get(chat_ws_handler))
                .with_state(state.chat_state()),
        );

    let mut router = Router::new()
        .merge(protected)
        .merge(public_routes())
        .with_state(state.clone())
        .merge(ws_routes)
        .route("/ws-test", get(ws_test_page))
        .nest(
            "/health",
            health::create_router(state.storage.clone(), state.kv.clone(), state.start_time),
        )
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));
    }

    if state.config.rate_limit_enabled {
        router = router.layer(from_fn_with_state(state.rate_limit_state(), rate_limit_middleware));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let cors = build_cors_layer(&state.config);

    Ok(router.layer(from_fn(observability_middleware)).layer(cors))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            header::RETRY_AFTER,
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: allowing configured origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter(|o| !o.starts_with("*."))
            .filter_map(|o| o.parse().ok())
            .collect();

        let cors = if config.cors_origins.iter().any(|o| o.starts_with("*.")) {
            // Wildcard subdomains need a predicate; exact origins are covered by it too.
            let allowed = config.clone();
            cors.allow_origin(tower_http::cors::AllowOrigin::predicate(
                move |origin: &HeaderValue, _| {
                    origin
                        .to_str()
                        .map(|o| allowed.is_origin_allowed(o))
                        .unwrap_or(false)
                },
            ))
        } else {
            cors.allow_origin(origins)
        };

        if config.cors_allow_credentials {
            cors.allow_credentials(true)
        } else {
            cors
        }
    }
}
