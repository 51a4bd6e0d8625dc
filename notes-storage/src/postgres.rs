//! PostgreSQL storage backed by a deadpool connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use notes_core::{
    EntityType, NewNote, NewUser, Note, NoteFilter, NoteId, NotePatch, NotesError, NotesResult,
    StorageError, User, UserId,
};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

use crate::storage::Storage;

/// Schema bootstrap, safe to run on every start.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            BIGSERIAL PRIMARY KEY,
    username      VARCHAR(50) NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          VARCHAR(20) NOT NULL DEFAULT 'user'
);

CREATE TABLE IF NOT EXISTS notes (
    id       BIGSERIAL PRIMARY KEY,
    title    VARCHAR(100) NOT NULL,
    content  VARCHAR(1000) NOT NULL,
    owner_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS notes_owner_id_idx ON notes (owner_id);
"#;

const NOTE_COLUMNS: &str = "id, title, content, owner_id";
const USER_COLUMNS: &str = "id, username, password_hash, role";

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout when checking a connection out of the pool
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "notes".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("NOTES_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("NOTES_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("NOTES_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("NOTES_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("NOTES_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("NOTES_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("NOTES_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> NotesResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            NotesError::from(StorageError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            })
        })
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: PoolError) -> NotesError {
    tracing::error!("Connection pool error: {:?}", err);
    StorageError::Unavailable {
        reason: err.to_string(),
    }
    .into()
}

fn query_error(err: tokio_postgres::Error) -> NotesError {
    tracing::error!("Database error: {:?}", err);
    StorageError::QueryFailed {
        reason: err.to_string(),
    }
    .into()
}

/// Escape LIKE metacharacters so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn row_to_user(row: &Row) -> NotesResult<User> {
    let role: String = row.try_get("role").map_err(query_error)?;
    Ok(User {
        id: row.try_get("id").map_err(query_error)?,
        username: row.try_get("username").map_err(query_error)?,
        password_hash: row.try_get("password_hash").map_err(query_error)?,
        role: role.parse().map_err(|e| StorageError::CorruptRow {
            reason: format!("users.role: {}", e),
        })?,
    })
}

fn row_to_note(row: &Row) -> NotesResult<Note> {
    Ok(Note {
        id: row.try_get("id").map_err(query_error)?,
        title: row.try_get("title").map_err(query_error)?,
        content: row.try_get("content").map_err(query_error)?,
        owner_id: row.try_get("owner_id").map_err(query_error)?,
    })
}

// ============================================================================
// POSTGRES STORAGE
// ============================================================================

/// Storage that runs parameterized SQL against a pooled connection.
#[derive(Clone)]
pub struct PgStorage {
    pool: Pool,
}

impl PgStorage {
    /// Create a new storage with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new storage from configuration.
    pub fn from_config(config: &DbConfig) -> NotesResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create tables and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> NotesResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL).await.map_err(query_error)?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    async fn get_conn(&self) -> NotesResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn user_insert(&self, user: &NewUser) -> NotesResult<User> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        let row = conn
            .query_one(
                sql.as_str(),
                &[&user.username, &user.password_hash, &user.role.as_str()],
            )
            .await
            .map_err(|err| {
                if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    StorageError::Duplicate {
                        entity_type: EntityType::User,
                        field: "username".to_string(),
                        value: user.username.clone(),
                    }
                    .into()
                } else {
                    query_error(err)
                }
            })?;
        row_to_user(&row)
    }

    async fn user_get_by_username(&self, username: &str) -> NotesResult<Option<User>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let row = conn
            .query_opt(sql.as_str(), &[&username])
            .await
            .map_err(query_error)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn note_insert(&self, owner_id: UserId, note: &NewNote) -> NotesResult<Note> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "INSERT INTO notes (title, content, owner_id) VALUES ($1, $2, $3) RETURNING {}",
            NOTE_COLUMNS
        );
        let row = conn
            .query_one(sql.as_str(), &[&note.title, &note.content, &owner_id])
            .await
            .map_err(|err| {
                if err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
                    StorageError::NotFound {
                        entity_type: EntityType::User,
                        id: owner_id,
                    }
                    .into()
                } else {
                    query_error(err)
                }
            })?;
        row_to_note(&row)
    }

    async fn note_get(&self, id: NoteId, owner_id: UserId) -> NotesResult<Option<Note>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM notes WHERE id = $1 AND owner_id = $2",
            NOTE_COLUMNS
        );
        let row = conn
            .query_opt(sql.as_str(), &[&id, &owner_id])
            .await
            .map_err(query_error)?;
        row.as_ref().map(row_to_note).transpose()
    }

    async fn note_list(&self, owner_id: UserId, filter: &NoteFilter) -> NotesResult<Vec<Note>> {
        let conn = self.get_conn().await?;
        let pattern = filter.search.as_deref().map(like_pattern);
        let skip = i64::from(filter.skip);
        let limit = i64::from(filter.limit);
        let sql = format!(
            "SELECT {} FROM notes \
             WHERE owner_id = $1 AND ($2::TEXT IS NULL OR title ILIKE $2 OR content ILIKE $2) \
             ORDER BY id OFFSET $3 LIMIT $4",
            NOTE_COLUMNS
        );
        let rows = conn
            .query(sql.as_str(), &[&owner_id, &pattern, &skip, &limit])
            .await
            .map_err(query_error)?;
        rows.iter().map(row_to_note).collect()
    }

    async fn note_update(
        &self,
        id: NoteId,
        owner_id: UserId,
        patch: &NotePatch,
    ) -> NotesResult<Option<Note>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "UPDATE notes SET title = COALESCE($3, title), content = COALESCE($4, content) \
             WHERE id = $1 AND owner_id = $2 RETURNING {}",
            NOTE_COLUMNS
        );
        let row = conn
            .query_opt(
                sql.as_str(),
                &[&id, &owner_id, &patch.title, &patch.content],
            )
            .await
            .map_err(query_error)?;
        row.as_ref().map(row_to_note).transpose()
    }

    async fn note_delete(&self, id: NoteId, owner_id: UserId) -> NotesResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM notes WHERE id = $1 AND owner_id = $2",
                &[&id, &owner_id],
            )
            .await
            .map_err(query_error)?;
        Ok(deleted > 0)
    }

    async fn ping(&self) -> NotesResult<()> {
        let conn = self.get_conn().await?;
        conn.simple_query("SELECT 1").await.map_err(query_error)?;
        Ok(())
    }
}
