use async_trait::async_trait;
use sqlx::PgPool;

use super::config::DB_TABLE_SESSIONS;
use super::errors::StorageError;
use super::types::{PostgresSessionStore, SessionRow, SessionStore, validate_table_name};
use crate::session::Session;

impl PostgresSessionStore {
    /// Uses the table name from `SESSION_TABLE_PREFIX`, rejecting prefixes
    /// that are not `[A-Za-z0-9_]`.
    pub fn new(pool: PgPool) -> Result<Self, StorageError> {
        Self::with_table(pool, DB_TABLE_SESSIONS.as_str())
    }

    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Result<Self, StorageError> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(url).await?;
        Self::new(pool)
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn init(&self) -> Result<(), StorageError> {
        let table = &self.table;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                refresh_until TIMESTAMPTZ NOT NULL,
                attributes TEXT NOT NULL DEFAULT '{{}}'
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_user_id ON {table}(user_id)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        let table = &self.table;

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT id, user_id, expires_at, refresh_until, attributes FROM {table} WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    #[tracing::instrument(skip(self, session), fields(table = %self.table, user_id = %session.user_id))]
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        let table = &self.table;
        let attributes = serde_json::to_string(&session.attributes)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (id, user_id, expires_at, refresh_until, attributes)
            VALUES ($1, $2, $3, $4, $5)
            "#
        ))
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(session.refresh_until)
        .bind(attributes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, session), fields(table = %self.table, user_id = %session.user_id))]
    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let table = &self.table;
        let attributes = serde_json::to_string(&session.attributes)?;

        let result = sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET user_id = $1, expires_at = $2, refresh_until = $3, attributes = $4
            WHERE id = $5
            "#
        ))
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(session.refresh_until)
        .bind(attributes)
        .bind(&session.session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        let table = &self.table;

        sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn delete_sessions_by_user_id(&self, user_id: &str) -> Result<(), StorageError> {
        let table = &self.table;

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(deleted = result.rows_affected(), "Deleted sessions for user");
        Ok(())
    }
}
