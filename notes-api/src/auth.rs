//! Authentication Module
//!
//! Bearer-token authentication for the notes API. Tokens are HMAC-signed JWTs
//! whose subject is the username; the middleware resolves the subject to a
//! stored user on every request.

use crate::error::{ApiError, ApiResult, ErrorCode};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use notes_core::{ConfigError, NotesError, Role, User, UserId};
use notes_storage::Storage;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock abstraction for JWT time validation.
///
/// Token times are validated here rather than inside `jsonwebtoken`, so tests
/// can pin "now" and exercise expiry without sleeping.
pub trait JwtClock: Send + Sync {
    /// Get current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// JWT secret that never shows up in logs or `Debug` output.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Create a new JWT secret.
    ///
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, NotesError> {
        if secret.trim().is_empty() {
            return Err(NotesError::Config(ConfigError::MissingRequired {
                field: "jwt_secret".to_string(),
            }));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (only for signing and verification).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    /// Check if the secret is the insecure default.
    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    JwtSecret::new(secret_str)
        .unwrap_or_else(|_| JwtSecret(SecretString::new(INSECURE_DEFAULT_SECRET.into())))
}

fn parse_algorithm(value: &str) -> Option<Algorithm> {
    match value.to_ascii_uppercase().as_str() {
        "HS256" => Some(Algorithm::HS256),
        "HS384" => Some(Algorithm::HS384),
        "HS512" => Some(Algorithm::HS512),
        _ => None,
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// JWT secret key for signing and verification
    pub jwt_secret: JwtSecret,

    /// JWT algorithm (HMAC family only, default: HS256)
    pub jwt_algorithm: Algorithm,

    /// JWT token expiration in seconds (default: 30 minutes)
    pub jwt_expiration_secs: i64,

    /// Tolerated clock drift when checking `exp` (default: 60)
    pub jwt_clock_skew_secs: i64,

    /// Clock for JWT time validation (injected for testing)
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: build_jwt_secret(INSECURE_DEFAULT_SECRET.to_string()),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 30 * 60,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `NOTES_JWT_SECRET`: JWT signing secret
    /// - `NOTES_JWT_ALGORITHM`: HS256, HS384 or HS512 (default: HS256)
    /// - `NOTES_JWT_EXPIRATION_SECS`: token lifetime (default: 1800)
    /// - `NOTES_JWT_CLOCK_SKEW_SECS`: clock skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secret_str =
            std::env::var("NOTES_JWT_SECRET").unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: std::env::var("NOTES_JWT_ALGORITHM")
                .ok()
                .and_then(|s| parse_algorithm(&s))
                .unwrap_or(defaults.jwt_algorithm),
            jwt_expiration_secs: std::env::var("NOTES_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_expiration_secs),
            jwt_clock_skew_secs: std::env::var("NOTES_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jwt_clock_skew_secs),
            clock: defaults.clock,
        }
    }

    /// Build a config with an explicit secret, mainly for tests and tools.
    pub fn with_secret(secret: impl Into<String>) -> ApiResult<Self> {
        Ok(Self {
            jwt_secret: JwtSecret::new(secret.into())?,
            ..Self::default()
        })
    }

    /// Replace the clock used for issuing and validating tokens.
    pub fn with_clock(mut self, clock: Arc<dyn JwtClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Refuse insecure secrets in production; warn about them elsewhere.
    pub fn validate_for_production(&self, environment: &str) -> ApiResult<()> {
        let environment = environment.to_lowercase();
        let is_production = environment == "production" || environment == "prod";

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::internal_error(format!(
                    "Cannot start server in production with insecure JWT secret. \
                     Set NOTES_JWT_SECRET to a secure value. \
                     NOTES_ENVIRONMENT={}",
                    environment
                )));
            }
            tracing::warn!(
                "Using insecure default JWT secret. Set NOTES_JWT_SECRET \
                 (at least 32 characters) before deploying."
            );
        } else if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::internal_error(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            }
            tracing::warn!(
                chars = self.jwt_secret.len(),
                "JWT secret is short; use at least 32 characters in production"
            );
        }

        Ok(())
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims for a user using a clock.
    pub fn new(username: String, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: username,
            iat: now,
            exp: now + expiration_secs,
        }
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// The authenticated caller, injected into request extensions by the auth
/// middleware after the token subject is resolved to a stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

impl AuthContext {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Fail with 403 unless the caller has `role`.
    pub fn require_role(&self, role: Role) -> ApiResult<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Requires role '{}'", role)))
        }
    }
}

impl From<&User> for AuthContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

/// Check `exp` against `now`, allowing `leeway_secs` of drift.
fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Validate a JWT token and extract claims.
///
/// `jsonwebtoken` checks the signature only; expiry is checked against the
/// configured clock.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();
    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;

    Ok(claims)
}

/// Generate a JWT token for a user.
pub fn generate_jwt_token(config: &AuthConfig, username: &str) -> ApiResult<String> {
    let claims = Claims::new(
        username.to_string(),
        config.jwt_expiration_secs,
        &*config.clock,
    );

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: Option<&str>) -> ApiResult<&str> {
    let value = auth_header.ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| ApiError::invalid_token("Authorization header must use Bearer scheme"))?
        .trim();
    if token.is_empty() {
        return Err(ApiError::invalid_token("Bearer token is empty"));
    }
    Ok(token)
}

/// Resolve a token to the stored user it names.
///
/// A valid token whose user no longer exists is rejected like a bad token.
pub async fn authenticate_token(
    config: &AuthConfig,
    storage: &dyn Storage,
    token: &str,
) -> ApiResult<AuthContext> {
    let claims = validate_jwt_token(config, token)?;
    let user = storage
        .user_get_by_username(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::from_code(ErrorCode::InvalidToken))?;
    Ok(AuthContext::from(&user))
}

// ============================================================================
// TESTS
// ============================================================================
