use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SessionError;

/// Server-side record binding an opaque id to a user and a validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Generated by the server at creation, never chosen by the client
    pub session_id: String,
    pub user_id: String,
    /// The session is usable strictly before this instant
    pub expires_at: DateTime<Utc>,
    /// `expires_at` may never be extended past this instant
    pub refresh_until: DateTime<Utc>,
    /// Carried by the record, not interpreted by this crate
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_refreshable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_valid_at(now) && now < self.refresh_until
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_refreshable(&self) -> bool {
        self.is_refreshable_at(Utc::now())
    }

    /// The expiry to use when `desired` is requested: `desired` itself, or
    /// `refresh_until` when `desired` lies beyond it.
    pub fn clamp_expiry(&self, desired: DateTime<Utc>) -> DateTime<Utc> {
        desired.min(self.refresh_until)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Template for a session that does not exist yet.
///
/// There is no id field: ids are assigned by the token source when the
/// session is created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_until: DateTime<Utc>,
    pub attributes: Map<String, Value>,
}

impl NewSession {
    pub fn new(
        user_id: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_until: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            expires_at,
            refresh_until,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SessionError> {
        if self.user_id.is_empty() {
            return Err(SessionError::InvalidSession(
                "user id must not be empty".to_string(),
            ));
        }
        if self.refresh_until < self.expires_at {
            return Err(SessionError::InvalidSession(format!(
                "refresh_until ({}) is before expires_at ({})",
                self.refresh_until, self.expires_at
            )));
        }
        Ok(())
    }

    pub(crate) fn into_session(self, session_id: String) -> Session {
        Session {
            session_id,
            user_id: self.user_id,
            expires_at: self.expires_at,
            refresh_until: self.refresh_until,
            attributes: self.attributes,
        }
    }
}

/// Copies everything but the id, which the server always replaces.
impl From<Session> for NewSession {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            expires_at: session.expires_at,
            refresh_until: session.refresh_until,
            attributes: session.attributes,
        }
    }
}
