//! Tracing Subscriber Initialization
//!
//! JSON lines by default, human-readable output with `NOTES_LOG_FORMAT=pretty`.
//! Verbosity comes from `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "notes-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("NOTES_SERVICE_NAME").unwrap_or(defaults.service_name),
            service_version: defaults.service_version,
            environment: std::env::var("NOTES_ENVIRONMENT").unwrap_or(defaults.environment),
            log_format: std::env::var("NOTES_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.log_format),
        }
    }
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notes_api=debug,notes_storage=debug,info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        "Telemetry initialized"
    );

    Ok(())
}
