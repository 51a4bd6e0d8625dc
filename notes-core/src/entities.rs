//! Entity and input types for users and notes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::validation;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Surrogate key of a user row.
pub type UserId = i64;

/// Surrogate key of a note row.
pub type NoteId = i64;

/// Entity type discriminator used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Note,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::User => write!(f, "User"),
            EntityType::Note => write!(f, "Note"),
        }
    }
}

// ============================================================================
// ROLES
// ============================================================================

/// Role attached to a user account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::InvalidValue {
                field: "role".to_string(),
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

// ============================================================================
// USERS
// ============================================================================

/// A registered account.
///
/// `password_hash` is a PHC string and never leaves the service; responses
/// are built from the public fields only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// A user row about to be inserted. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

// ============================================================================
// NOTES
// ============================================================================

/// A note owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub owner_id: UserId,
}

/// Fields of a note being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewNote {
    pub title: String,
    pub content: String,
}

impl NewNote {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_title(&self.title)?;
        validation::validate_content(&self.content)
    }
}

/// Partial update of a note. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NotePatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validation::validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validation::validate_content(content)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }

    /// Apply the present fields to `note` in place.
    pub fn apply(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
    }
}

/// Paging and search parameters for listing an owner's notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteFilter {
    pub skip: u32,
    pub limit: u32,
    /// Case-insensitive substring matched against title or content.
    pub search: Option<String>,
}

impl Default for NoteFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: validation::DEFAULT_PAGE_LIMIT,
            search: None,
        }
    }
}

impl NoteFilter {
    /// Build a filter from raw query values, applying defaults and bounds.
    pub fn from_query(
        skip: Option<i64>,
        limit: Option<i64>,
        search: Option<String>,
    ) -> Result<Self, ValidationError> {
        let skip = match skip {
            Some(value) => validation::validate_skip(value)?,
            None => 0,
        };
        let limit = match limit {
            Some(value) => validation::validate_limit(value)?,
            None => validation::DEFAULT_PAGE_LIMIT,
        };
        let search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(Self { skip, limit, search })
    }

    /// Whether `note` matches the search term, if any.
    pub fn matches(&self, note: &Note) -> bool {
        match &self.search {
            None => true,
            Some(term) => {
                let needle = term.to_lowercase();
                note.title.to_lowercase().contains(&needle)
                    || note.content.to_lowercase().contains(&needle)
            }
        }
    }
}
