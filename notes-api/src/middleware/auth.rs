//! Axum Middleware for Authentication
//!
//! Validates the `Authorization: Bearer <token>` header, resolves the token
//! subject to a stored user and injects [`AuthContext`] into request
//! extensions. Missing, malformed, expired or orphaned tokens get 401.

use crate::auth::{authenticate_token, extract_bearer_token, AuthConfig, AuthContext};
use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use notes_storage::Storage;
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
    /// Storage used to resolve token subjects to users.
    pub storage: Arc<dyn Storage>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: Arc<AuthConfig>, storage: Arc<dyn Storage>) -> Self {
        Self {
            auth_config,
            storage,
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for bearer-token authentication.
///
/// # Example
///
/// ```ignore
/// let auth_state = AuthMiddlewareState::new(auth_config, storage);
///
/// let app = Router::new()
///     .route("/notes", axum::routing::get(list_notes))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = extract_bearer_token(auth_header).map_err(AuthMiddlewareError)?;
    let auth_context = authenticate_token(&state.auth_config, state.storage.as_ref(), token)
        .await
        .map_err(AuthMiddlewareError)?;

    tracing::debug!(
        user_id = auth_context.user_id,
        username = %auth_context.username,
        "Request authenticated"
    );

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
///
/// 401 responses carry `WWW-Authenticate: Bearer`.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        let unauthorized = self.0.status_code() == axum::http::StatusCode::UNAUTHORIZED;
        let mut response = self.0.into_response();
        if unauthorized {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed Axum extractor for the authenticated caller.
///
/// `auth_middleware` must run on the route; without it the extractor fails
/// with 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
