use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::HeaderMap;

use super::cookie::{CookieError, SessionCookie, get_cookie_value};
use super::types::{NewSession, Session};
use crate::config::CookieOptions;
use crate::encrypter::ReversibleEncoder;
use crate::errors::SessionError;
use crate::generator::TokenSource;
use crate::storage::{SessionStore, StorageError};

/// Collaborators and cookie settings for a [`SessionService`]. All are required.
#[derive(Clone)]
pub struct SessionServiceOptions {
    pub store: Arc<dyn SessionStore>,
    pub encrypter: Arc<dyn ReversibleEncoder>,
    pub generator: Arc<dyn TokenSource>,
    pub cookie_options: CookieOptions,
}

/// Session lifecycle on top of a store, an id generator and a cookie encrypter.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    encrypter: Arc<dyn ReversibleEncoder>,
    generator: Arc<dyn TokenSource>,
    cookie_options: CookieOptions,
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("cookie_options", &self.cookie_options)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    pub fn new(options: SessionServiceOptions) -> Result<Self, SessionError> {
        options.cookie_options.validate()?;

        Ok(Self {
            store: options.store,
            encrypter: options.encrypter,
            generator: options.generator,
            cookie_options: options.cookie_options,
        })
    }

    pub fn cookie_options(&self) -> &CookieOptions {
        &self.cookie_options
    }

    /// Persist a new session under a freshly generated id.
    #[tracing::instrument(skip(self, new_session), fields(user_id = %new_session.user_id))]
    pub async fn create_session(&self, new_session: NewSession) -> Result<Session, SessionError> {
        new_session.validate()?;

        let session_id = self.generator.generate().map_err(|e| {
            tracing::error!("Failed to generate session id: {}", e);
            SessionError::Generation(format!("error generating session id: {e}"))
        })?;

        let session = new_session.into_session(session_id);

        self.store.insert_session(&session).await.map_err(|e| {
            tracing::error!("Failed to insert session: {}", e);
            SessionError::Storage(format!("error inserting session: {e}"))
        })?;

        tracing::info!(expires_at = %session.expires_at, "Created session");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session, SessionError> {
        self.get_session_at(session_id, Utc::now()).await
    }

    /// Look a session up and check it against `now`.
    ///
    /// An expired record is reported as [`SessionError::Expired`] even though
    /// the store still holds it.
    #[tracing::instrument(skip(self, session_id))]
    pub async fn get_session_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let session = self
            .store
            .get_session(session_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to read session: {}", e);
                SessionError::Storage(format!("error reading session: {e}"))
            })?
            .ok_or_else(|| {
                tracing::debug!("Session not found in store");
                SessionError::NotFound
            })?;

        if session.is_expired_at(now) {
            tracing::debug!(
                user_id = %session.user_id,
                expires_at = %session.expires_at,
                now = %now,
                "Session expired"
            );
            return Err(SessionError::Expired {
                expires_at: session.expires_at,
                now,
            });
        }

        Ok(session)
    }

    /// Decrypt a cookie value and load the session it names.
    pub async fn get_session_from_cookie(&self, cookie_value: &str) -> Result<Session, SessionError> {
        let session_id = self.decrypt_session_id(cookie_value).map_err(|e| {
            tracing::debug!("Failed to decrypt session cookie: {}", e);
            e
        })?;

        self.get_session(&session_id).await
    }

    /// Find the configured session cookie in the request headers and load its session.
    pub async fn get_session_from_headers(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let cookie_value = get_cookie_value(headers, &self.cookie_options.name)
            .ok_or(SessionError::NotFound)?;

        self.get_session_from_cookie(&cookie_value).await
    }

    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id, expires_at = %session.expires_at))]
    pub async fn update_session(&self, session: &Session) -> Result<(), SessionError> {
        self.store
            .update_session(session)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => SessionError::NotFound,
                other => {
                    tracing::error!("Failed to update session: {}", other);
                    SessionError::Storage(format!("error updating session: {other}"))
                }
            })
    }

    #[tracing::instrument(skip(self, session_id))]
    pub async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.delete_session(session_id).await.map_err(|e| {
            tracing::error!("Failed to delete session: {}", e);
            SessionError::Storage(format!("error deleting session: {e}"))
        })
    }

    /// Remove every session owned by `user_id`.
    #[tracing::instrument(skip(self))]
    pub async fn delete_sessions_by_user_id(&self, user_id: &str) -> Result<(), SessionError> {
        self.store
            .delete_sessions_by_user_id(user_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete sessions for user: {}", e);
                SessionError::Storage(format!("error deleting sessions for user: {e}"))
            })?;

        tracing::info!("Deleted all sessions for user");
        Ok(())
    }

    pub fn encrypt_session_id(&self, session_id: &str) -> Result<String, SessionError> {
        self.encrypter.encrypt(session_id)
    }

    pub fn decrypt_session_id(&self, cookie_value: &str) -> Result<String, SessionError> {
        self.encrypter.decrypt(cookie_value)
    }

    /// Cookie carrying the encrypted id of `session`, expiring with it.
    ///
    /// On failure the error still holds [`Self::empty_cookie`].
    pub fn create_cookie(&self, session: &Session) -> Result<SessionCookie, CookieError> {
        match self.encrypt_session_id(&session.session_id) {
            Ok(value) => Ok(SessionCookie::new(
                &self.cookie_options,
                value,
                session.expires_at,
            )),
            Err(source) => {
                tracing::error!("Failed to encrypt session id: {}", source);
                Err(CookieError {
                    cookie: self.empty_cookie(),
                    source,
                })
            }
        }
    }

    pub fn empty_cookie(&self) -> SessionCookie {
        SessionCookie::empty(&self.cookie_options)
    }
}
