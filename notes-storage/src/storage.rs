//! Async storage trait for users and notes.

use async_trait::async_trait;
use notes_core::{NewNote, NewUser, Note, NoteFilter, NoteId, NotePatch, NotesResult, User, UserId};

/// Async storage trait for database operations.
///
/// Every note operation takes the caller's `owner_id` and only ever sees rows
/// owned by it. A row owned by someone else behaves exactly like a missing row.
#[async_trait]
pub trait Storage: Send + Sync {
    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Insert a new user. Fails with `StorageError::Duplicate` when the
    /// username is taken.
    async fn user_insert(&self, user: &NewUser) -> NotesResult<User>;

    /// Get a user by username (exact match).
    async fn user_get_by_username(&self, username: &str) -> NotesResult<Option<User>>;

    // ========================================================================
    // NOTE OPERATIONS
    // ========================================================================

    /// Insert a note for `owner_id`. Fails with `StorageError::NotFound` when
    /// the owner does not exist.
    async fn note_insert(&self, owner_id: UserId, note: &NewNote) -> NotesResult<Note>;

    /// Get a note by ID if it belongs to `owner_id`.
    async fn note_get(&self, id: NoteId, owner_id: UserId) -> NotesResult<Option<Note>>;

    /// List the owner's notes ordered by ID, applying search and paging.
    async fn note_list(&self, owner_id: UserId, filter: &NoteFilter) -> NotesResult<Vec<Note>>;

    /// Apply a partial update. Returns `None` if the note is missing or not owned.
    async fn note_update(
        &self,
        id: NoteId,
        owner_id: UserId,
        patch: &NotePatch,
    ) -> NotesResult<Option<Note>>;

    /// Delete a note. Returns `false` if the note is missing or not owned.
    async fn note_delete(&self, id: NoteId, owner_id: UserId) -> NotesResult<bool>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Check that the backend is reachable.
    async fn ping(&self) -> NotesResult<()>;
}
