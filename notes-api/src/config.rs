//! API Configuration Module
//!
//! Server, CORS, rate limiting, caching and backend selection settings,
//! loaded from `NOTES_*` environment variables with development defaults.

use notes_core::ConfigError;
use std::net::SocketAddr;
use std::time::Duration;

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Where users and notes are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "mem" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "NOTES_STORAGE".to_string(),
                value: other.to_string(),
                reason: "expected 'postgres' or 'memory'".to_string(),
            }),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the listener, CORS, rate limiting and caching.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Socket address to listen on.
    pub bind_addr: SocketAddr,

    /// `development` or `production`; production refuses insecure secrets.
    pub environment: String,

    // ========================================================================
    // Backends
    // ========================================================================
    pub storage_backend: StorageBackend,

    /// Redis URL for the cache and rate-limit counters. `None` keeps both in
    /// process memory.
    pub redis_url: Option<String>,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Rate Limiting Configuration
    // ========================================================================
    /// Whether rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Requests allowed per client IP in one window.
    pub rate_limit_requests: u64,

    /// Fixed window length.
    pub rate_limit_window: Duration,

    /// Key clients by `x-forwarded-for` / `x-real-ip` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,

    // ========================================================================
    // Caching and realtime
    // ========================================================================
    /// TTL of cached note reads.
    pub cache_ttl: Duration,

    /// Buffered messages per WebSocket channel before slow receivers lag.
    pub ws_channel_capacity: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            environment: "development".to_string(),

            storage_backend: StorageBackend::Postgres,
            redis_url: None,

            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,

            rate_limit_enabled: true,
            rate_limit_requests: 100,
            rate_limit_window: Duration::from_secs(60),
            trust_proxy_headers: false,

            cache_ttl: Duration::from_secs(60),
            ws_channel_capacity: 1024,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Unparseable values fall back to the default, except `NOTES_STORAGE`
    /// which must name a known backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let storage_backend = match std::env::var("NOTES_STORAGE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.storage_backend,
        };

        let cors_origins = std::env::var("NOTES_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let rate_limit_enabled = std::env::var("NOTES_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(defaults.rate_limit_enabled);

        Ok(Self {
            bind_addr: env_parse("NOTES_BIND_ADDR").unwrap_or(defaults.bind_addr),
            environment: std::env::var("NOTES_ENVIRONMENT").unwrap_or(defaults.environment),
            storage_backend,
            redis_url: std::env::var("NOTES_REDIS_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            cors_origins,
            cors_allow_credentials: std::env::var("NOTES_CORS_ALLOW_CREDENTIALS")
                .ok()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(defaults.cors_allow_credentials),
            cors_max_age_secs: env_parse("NOTES_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            rate_limit_enabled,
            rate_limit_requests: env_parse("NOTES_RATE_LIMIT_REQUESTS")
                .filter(|n: &u64| *n > 0)
                .unwrap_or(defaults.rate_limit_requests),
            rate_limit_window: env_parse("NOTES_RATE_LIMIT_WINDOW_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            trust_proxy_headers: std::env::var("NOTES_TRUST_PROXY_HEADERS")
                .ok()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(defaults.trust_proxy_headers),
            cache_ttl: env_parse("NOTES_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            ws_channel_capacity: env_parse("NOTES_WS_CHANNEL_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.ws_channel_capacity),
        })
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(domain) = allowed.strip_prefix("*.") {
                if let Some(host) = origin.strip_prefix("https://") {
                    return host.ends_with(&format!(".{}", domain));
                }
            }
            false
        })
    }
}
