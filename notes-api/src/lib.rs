//! Notes API - REST/WebSocket API Layer
//!
//! Axum server for the notes service: bearer-token auth, per-owner note
//! CRUD with a response cache, per-IP rate limiting and two realtime
//! WebSocket channels. Storage and the key-value store come from
//! `notes-storage` and are chosen at startup.

#[macro_use]
mod macros;

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod password;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod ws;

// Re-export commonly used types
pub use auth::{
    authenticate_token, extract_bearer_token, generate_jwt_token, validate_jwt_token, AuthConfig,
    AuthContext, Claims, FixedClock, JwtClock, SystemClock,
};
pub use cache::ResponseCache;
pub use config::{ApiConfig, StorageBackend};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use extractors::{ApiJson, ApiPath, ApiQuery};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use rate_limit::{RateDecision, RateLimiter};
pub use routes::create_api_router;
pub use state::AppState;
pub use types::*;
pub use ws::{WsEvent, WsState};
