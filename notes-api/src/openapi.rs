//! OpenAPI Specification for the notes API
//!
//! Generated from route annotations and schema derives with utoipa. Served
//! at `/openapi.json` and, with the `swagger-ui` feature, browsable at
//! `/swagger-ui`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::{
    health::{self, ComponentHealth, HealthResponse, HealthStatus, ReadinessResponse},
    note, user,
};
use crate::telemetry::metrics;
use crate::types::*;

use notes_core::{NewNote, Note, NotePatch, Role};

/// OpenAPI document for the notes API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Notes API",
        version = "0.4.0",
        description = "Notes with bearer-token auth, per-owner CRUD, response caching, rate limiting and realtime chat",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Users", description = "Registration, login and the current user"),
        (name = "Notes", description = "CRUD over the caller's own notes"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        user::register,
        user::login,
        user::me,
        user::admin,
        note::create_note,
        note::list_notes,
        note::get_note,
        note::update_note,
        note::delete_note,
        health::health,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === User Types ===
            RegisterRequest, LoginRequest, TokenResponse, UserResponse, Role,

            // === Note Types ===
            Note, NewNote, NotePatch, DeleteResponse,

            // === Health Types ===
            HealthResponse, ReadinessResponse, HealthStatus, ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from POST /users/login"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Notes API");

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("Note"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        for path in [
            "/users/register",
            "/users/login",
            "/users/me",
            "/users/admin",
            "/notes",
            "/notes/{id}",
            "/health",
            "/health/ready",
            "/metrics",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_openapi_json_is_valid() -> Result<(), serde_json::Error> {
        let json = ApiDoc::to_json()?;
        serde_json::from_str::<serde_json::Value>(&json)?;
        Ok(())
    }
}
