//! Middleware for the notes API
//!
//! - `auth`: bearer-token authentication for protected routes
//! - `rate_limit`: per-IP fixed-window rate limiting for every route
//!
//! # Middleware Order
//!
//! ```ignore
//! Router::new()
//!     .route("/notes", get(handler))
//!     // Innermost, protected routes only
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//!     // Applied to the whole router, rejects floods before auth runs
//!     .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
//! ```

mod auth;
mod rate_limit;

pub use auth::{auth_middleware, AuthExtractor, AuthMiddlewareError, AuthMiddlewareState};
pub use rate_limit::{extract_client_ip, rate_limit_middleware, RateLimitError, RateLimitState};
