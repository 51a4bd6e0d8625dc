//! Request and Response Types
//!
//! Wire types for the REST endpoints. Entity types (`Note`, `NewNote`,
//! `NotePatch`) come from `notes-core` and are used as-is.

use notes_core::{Role, User, UserId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// USERS
// ============================================================================

/// Body of `POST /users/register`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RegisterRequest {
    /// 3 to 50 characters, unique.
    pub username: String,
    /// At least 8 characters.
    pub password: String,
}

/// Body of `POST /users/login`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

// ============================================================================
// NOTES
// ============================================================================

/// Query string of `GET /notes`.
///
/// Kept as raw integers so out-of-range values reach validation and get 422
/// instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotesParams {
    /// Notes to skip, at least 0. Default 0.
    pub skip: Option<i64>,
    /// Page size, 1 to 100. Default 10.
    pub limit: Option<i64>,
    /// Case-insensitive substring of title or content.
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_hides_password_hash() -> Result<(), serde_json::Error> {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Admin,
        };
        let json = serde_json::to_value(UserResponse::from(user))?;
        assert_eq!(json, serde_json::json!({"id": 1, "username": "alice", "role": "admin"}));
        Ok(())
    }

    #[test]
    fn test_token_type_is_bearer() {
        assert_eq!(TokenResponse::bearer("t".to_string()).token_type, "bearer");
    }
}
