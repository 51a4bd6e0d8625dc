//! User REST API Routes
//!
//! Registration, login, the current-user endpoint and an admin-only check.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use notes_core::{validation, NewUser, Role};
use notes_storage::Storage;

use crate::{
    auth::{generate_jwt_token, AuthConfig},
    error::{ApiError, ApiResult},
    extractors::ApiJson,
    middleware::AuthExtractor,
    password::{hash_password, verify_password},
    types::{LoginRequest, RegisterRequest, TokenResponse, UserResponse},
};

/// Run a password operation off the async executor.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal_error(format!("Password task failed: {}", e)))
}

/// POST /users/register - Create an account with role `user`
#[utoipa::path(
    post,
    path = "/users/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Username already registered", body = ApiError),
        (status = 422, description = "Username or password out of bounds", body = ApiError),
    ),
)]
pub async fn register(
    State(storage): State<Arc<dyn Storage>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validation::validate_username(&req.username)?;
    validation::validate_password(&req.password)?;

    if storage.user_get_by_username(&req.username).await?.is_some() {
        return Err(ApiError::username_taken());
    }

    let password = req.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    // A concurrent registration can still win the race; the unique
    // constraint turns that into the same 400.
    let user = storage
        .user_insert(&NewUser {
            username: req.username,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /users/login - Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/users/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password", body = ApiError),
    ),
)]
pub async fn login(
    State(storage): State<Arc<dyn Storage>>,
    State(auth): State<Arc<AuthConfig>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = storage
        .user_get_by_username(&req.username)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    let password = req.password;
    let stored_hash = user.password_hash.clone();
    let verified = blocking(move || verify_password(&password, &stored_hash)).await?;
    if !verified {
        tracing::info!(username = %user.username, "Login rejected");
        return Err(ApiError::invalid_credentials());
    }

    let token = generate_jwt_token(&auth, &user.username)?;
    Ok(Json(TokenResponse::bearer(token)))
}

/// GET /users/me - The authenticated user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(AuthExtractor(auth): AuthExtractor) -> Json<UserResponse> {
    Json(UserResponse {
        id: auth.user_id,
        username: auth.username,
        role: auth.role,
    })
}

/// GET /users/admin - Admin-only check
#[utoipa::path(
    get,
    path = "/users/admin",
    tag = "Users",
    responses(
        (status = 200, description = "Caller is an admin", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Caller lacks the admin role", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn admin(AuthExtractor(auth): AuthExtractor) -> ApiResult<Json<UserResponse>> {
    auth.require_role(Role::Admin)?;
    Ok(Json(UserResponse {
        id: auth.user_id,
        username: auth.username,
        role: auth.role,
    }))
}
