//! In-memory storage used by tests and `NOTES_STORAGE=memory`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use notes_core::{
    EntityType, NewNote, NewUser, Note, NoteFilter, NoteId, NotePatch, NotesResult,
    StorageError, User, UserId,
};
use tokio::sync::RwLock;

use crate::storage::Storage;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    notes: BTreeMap<NoteId, Note>,
    next_user_id: UserId,
    next_note_id: NoteId,
}

/// Storage backed by ordered maps behind a single lock, so the username
/// uniqueness check and the insert happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn note_count(&self) -> usize {
        self.tables.read().await.notes.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn user_insert(&self, user: &NewUser) -> NotesResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::Duplicate {
                entity_type: EntityType::User,
                field: "username".to_string(),
                value: user.username.clone(),
            }
            .into());
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn user_get_by_username(&self, username: &str) -> NotesResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn note_insert(&self, owner_id: UserId, note: &NewNote) -> NotesResult<Note> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner_id) {
            return Err(StorageError::NotFound {
                entity_type: EntityType::User,
                id: owner_id,
            }
            .into());
        }
        tables.next_note_id += 1;
        let created = Note {
            id: tables.next_note_id,
            title: note.title.clone(),
            content: note.content.clone(),
            owner_id,
        };
        tables.notes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn note_get(&self, id: NoteId, owner_id: UserId) -> NotesResult<Option<Note>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notes
            .get(&id)
            .filter(|n| n.owner_id == owner_id)
            .cloned())
    }

    async fn note_list(&self, owner_id: UserId, filter: &NoteFilter) -> NotesResult<Vec<Note>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notes
            .values()
            .filter(|n| n.owner_id == owner_id && filter.matches(n))
            .skip(filter.skip as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn note_update(
        &self,
        id: NoteId,
        owner_id: UserId,
        patch: &NotePatch,
    ) -> NotesResult<Option<Note>> {
        let mut tables = self.tables.write().await;
        match tables.notes.get_mut(&id) {
            Some(note) if note.owner_id == owner_id => {
                patch.apply(note);
                Ok(Some(note.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn note_delete(&self, id: NoteId, owner_id: UserId) -> NotesResult<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .notes
            .get(&id)
            .is_some_and(|n| n.owner_id == owner_id);
        if owned {
            tables.notes.remove(&id);
        }
        Ok(owned)
    }

    async fn ping(&self) -> NotesResult<()> {
        Ok(())
    }
}
