use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::errors::StorageError;
use super::types::{RedisSessionStore, SessionStore};
use crate::session::Session;

const SESSION_KEY_PREFIX: &str = "session";
const USER_INDEX_KEY_PREFIX: &str = "session_user";

fn session_key(session_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}:{session_id}")
}

fn user_index_key(user_id: &str) -> String {
    format!("{USER_INDEX_KEY_PREFIX}:{user_id}")
}

/// Whole seconds until `instant`, rounded up and never less than one.
fn secs_until(instant: DateTime<Utc>) -> i64 {
    let ms = (instant - Utc::now()).num_milliseconds();
    ((ms + 999) / 1000).max(1)
}

/// Record TTL: the key must outlive every instant before `expires_at`.
fn ttl_secs(session: &Session) -> i64 {
    secs_until(session.expires_at)
}

/// Index TTL: long enough for any refresh of this session.
fn index_ttl_secs(session: &Session) -> i64 {
    secs_until(session.refresh_until).max(ttl_secs(session))
}

impl RedisSessionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn open(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client))
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Drop index members whose session record has expired.
    ///
    /// Returns the number of members removed.
    pub async fn prune_user_index(&self, user_id: &str) -> Result<usize, StorageError> {
        let mut conn = self.connection().await?;
        let index_key = user_index_key(user_id);

        let members: Vec<String> = conn.smembers(&index_key).await?;
        if members.is_empty() {
            return Ok(0);
        }

        let mut exists = redis::pipe();
        for id in &members {
            exists.exists(session_key(id));
        }
        let alive: Vec<bool> = exists.query_async(&mut conn).await?;

        let dead: Vec<&String> = members
            .iter()
            .zip(alive)
            .filter_map(|(id, alive)| (!alive).then_some(id))
            .collect();
        if dead.is_empty() {
            return Ok(0);
        }

        let _: () = conn.srem(&index_key, &dead).await?;
        tracing::debug!(pruned = dead.len(), "Pruned expired sessions from user index");
        Ok(dead.len())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn init(&self) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(session_key(session_id)).await?;

        value
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StorageError::from)
    }

    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(session)?;
        let index_key = user_index_key(&session.user_id);
        let index_ttl = index_ttl_secs(session);

        // Record and index entry land together or not at all. EXPIRE NX gives a
        // fresh index its TTL and EXPIRE GT only ever extends it (Redis 7+).
        let (reply,): (Option<String>,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(session_key(&session.session_id))
            .arg(json)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(session))
            .cmd("SADD")
            .arg(&index_key)
            .arg(&session.session_id)
            .ignore()
            .cmd("EXPIRE")
            .arg(&index_key)
            .arg(index_ttl)
            .arg("NX")
            .ignore()
            .cmd("EXPIRE")
            .arg(&index_key)
            .arg(index_ttl)
            .arg("GT")
            .ignore()
            .query_async(&mut conn)
            .await?;

        if reply.is_none() {
            // SADD ran anyway; take it back unless the existing record is this user's
            let existing: Option<String> = conn.get(session_key(&session.session_id)).await?;
            let same_owner = existing
                .and_then(|json| serde_json::from_str::<Session>(&json).ok())
                .is_some_and(|stored| stored.user_id == session.user_id);
            if !same_owner {
                let _: () = conn.srem(&index_key, &session.session_id).await?;
            }
            return Err(StorageError::Storage(
                "Session id already exists".to_string(),
            ));
        }

        if let Err(e) = self.prune_user_index(&session.user_id).await {
            tracing::warn!("Failed to prune session index: {}", e);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(session)?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(session_key(&session.session_id))
            .arg(json)
            .arg("XX")
            .arg("EX")
            .arg(ttl_secs(session))
            .query_async(&mut conn)
            .await?;

        match reply {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound),
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let key = session_key(session_id);

        let value: Option<String> = conn.get(&key).await?;
        let _: () = conn.del(&key).await?;

        // Members whose record already expired are pruned on the next insert
        // or bulk delete for that user.
        let Some(json) = value else {
            return Ok(());
        };
        match serde_json::from_str::<Session>(&json) {
            Ok(session) => {
                let _: () = conn
                    .srem(user_index_key(&session.user_id), session_id)
                    .await?;
            }
            Err(e) => {
                tracing::warn!("Deleted unreadable session record, index not updated: {}", e);
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_sessions_by_user_id(&self, user_id: &str) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let index_key = user_index_key(user_id);

        let session_ids: Vec<String> = conn.smembers(&index_key).await?;
        let mut keys: Vec<String> = session_ids.iter().map(|id| session_key(id)).collect();
        // Dropping the index prunes live and dead members alike
        keys.push(index_key);

        let _: () = conn.del(keys).await?;
        tracing::debug!(members = session_ids.len(), "Deleted sessions for user");
        Ok(())
    }
}
