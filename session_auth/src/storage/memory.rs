use async_trait::async_trait;
use dashmap::mapref::entry::Entry;

use super::errors::StorageError;
use super::types::{InMemorySessionStore, SessionStore};
use crate::session::Session;

impl InMemorySessionStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory session store");
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.entries.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        match self.entries.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Storage(
                "Session id already exists".to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        match self.entries.get_mut(&session.session_id) {
            Some(mut entry) => {
                *entry = session.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        self.entries.remove(session_id);
        Ok(())
    }

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> Result<(), StorageError> {
        self.entries.retain(|_, session| session.user_id != user_id);
        Ok(())
    }
}
