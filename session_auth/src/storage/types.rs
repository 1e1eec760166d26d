use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::session::Session;
use crate::storage::errors::StorageError;

/// Durable CRUD for session records.
///
/// Stores only persist; expiry, id generation and cookie handling happen in
/// [`SessionService`](crate::SessionService). Implementations own their I/O
/// deadlines and retry policy.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Prepare the backing storage (create tables, check connectivity).
    async fn init(&self) -> Result<(), StorageError>;

    /// `Ok(None)` when no record exists for `session_id`.
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError>;

    /// Fails if a record with the same id already exists.
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Persist the mutable fields of an existing record.
    ///
    /// Returns [`StorageError::NotFound`] when the record is gone.
    async fn update_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Removing an absent record is not an error.
    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError>;

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> Result<(), StorageError>;
}

/// Concurrent map keyed by session id
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    pub(super) entries: DashMap<String, Session>,
}

#[derive(Debug, Clone)]
pub struct RedisSessionStore {
    pub(super) client: redis::Client,
}

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pub(super) pool: sqlx::SqlitePool,
    pub(super) table: String,
}

#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    pub(super) pool: sqlx::PgPool,
    pub(super) table: String,
}

/// Row layout shared by the SQL stores; attributes are stored as JSON text.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct SessionRow {
    pub(super) id: String,
    pub(super) user_id: String,
    pub(super) expires_at: DateTime<Utc>,
    pub(super) refresh_until: DateTime<Utc>,
    pub(super) attributes: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = StorageError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: row.id,
            user_id: row.user_id,
            expires_at: row.expires_at,
            refresh_until: row.refresh_until,
            attributes: serde_json::from_str(&row.attributes)?,
        })
    }
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_]` is accepted.
pub(super) fn validate_table_name(table: &str) -> Result<(), StorageError> {
    if table.is_empty()
        || !table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StorageError::Storage(format!(
            "Invalid table name: {table:?}"
        )));
    }
    Ok(())
}
