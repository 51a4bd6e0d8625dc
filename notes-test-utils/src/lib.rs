//! Notes Test Utilities
//!
//! Shared test infrastructure for the notes workspace:
//! - Fixtures for users and notes
//! - A key-value store that always fails, for fail-open paths
//! - Proptest generators for valid inputs

use std::time::Duration;

use async_trait::async_trait;
use notes_storage::{KvResult, KvStore, Storage, WindowCount};
use proptest::prelude::*;

// Re-export core types for convenience
pub use notes_core::{
    validation, KvError, NewNote, NewUser, Note, NoteFilter, NoteId, NotePatch, NotesError,
    NotesResult, Role, StorageError, User, UserId, ValidationError,
};
pub use notes_storage::{InMemoryStorage, MemoryKv};

// ============================================================================
// FIXTURES
// ============================================================================

/// Placeholder hash for users inserted directly into storage. It is not a
/// valid PHC string, so no password logs in as this user.
pub const UNUSABLE_PASSWORD_HASH: &str = "!unusable";

pub fn new_user(username: &str, role: Role) -> NewUser {
    NewUser {
        username: username.to_string(),
        password_hash: UNUSABLE_PASSWORD_HASH.to_string(),
        role,
    }
}

pub fn new_note(title: &str, content: &str) -> NewNote {
    NewNote {
        title: title.to_string(),
        content: content.to_string(),
    }
}

/// Insert a user directly, bypassing registration.
pub async fn seed_user(storage: &dyn Storage, username: &str, role: Role) -> NotesResult<User> {
    storage.user_insert(&new_user(username, role)).await
}

/// Insert `count` notes titled `note 0`, `note 1`, ... for `owner_id`.
pub async fn seed_notes(storage: &dyn Storage, owner_id: UserId, count: usize) -> NotesResult<Vec<Note>> {
    let mut notes = Vec::with_capacity(count);
    for i in 0..count {
        let note = new_note(&format!("note {}", i), &format!("content of note {}", i));
        notes.push(storage.note_insert(owner_id, &note).await?);
    }
    Ok(notes)
}

// ============================================================================
// FAILING KEY-VALUE STORE
// ============================================================================

/// A [`KvStore`] whose every call fails as if the server were down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingKv;

impl FailingKv {
    fn unavailable<T>() -> KvResult<T> {
        Err(KvError::Unavailable {
            reason: "connection refused".to_string(),
        })
    }
}

#[async_trait]
impl KvStore for FailingKv {
    async fn get(&self, _key: &str) -> KvResult<Option<Vec<u8>>> {
        Self::unavailable()
    }

    async fn set_ex(&self, _key: &str, _value: &[u8], _ttl: Duration) -> KvResult<()> {
        Self::unavailable()
    }

    async fn delete_prefix(&self, _prefix: &str) -> KvResult<u64> {
        Self::unavailable()
    }

    async fn incr_window(&self, _key: &str, _window: Duration) -> KvResult<WindowCount> {
        Self::unavailable()
    }

    async fn ping(&self) -> KvResult<()> {
        Self::unavailable()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Usernames within the accepted length bounds.
pub fn arb_username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{2,49}"
}

pub fn arb_title() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ]{1,100}"
}

pub fn arb_content() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 .,]{1,1000}"
}

pub fn arb_new_note() -> impl Strategy<Value = NewNote> {
    (arb_title(), arb_content()).prop_map(|(title, content)| NewNote { title, content })
}
