//! Deployment configuration for the session cookie

use std::env;

use crate::errors::SessionError;

pub const SESSION_COOKIE_NAME_VAR: &str = "SESSION_COOKIE_NAME";
pub const SESSION_COOKIE_PATH_VAR: &str = "SESSION_COOKIE_PATH";
pub const SESSION_COOKIE_SECURE_VAR: &str = "SESSION_COOKIE_SECURE";

/// Cookie attributes fixed per deployment.
///
/// `HttpOnly` is not configurable: every cookie this crate emits carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Cookie identifier on the wire
    pub name: String,
    /// Scope path
    pub path: String,
    /// Only send over encrypted transport
    pub secure: bool,
}

impl CookieOptions {
    pub fn new(name: impl Into<String>, path: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            secure,
        }
    }

    /// Read the cookie options from the environment.
    ///
    /// * `SESSION_COOKIE_NAME` - required
    /// * `SESSION_COOKIE_PATH` - defaults to `/`
    /// * `SESSION_COOKIE_SECURE` - defaults to `true`; only `false` disables it
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_vars(
            env::var(SESSION_COOKIE_NAME_VAR).ok(),
            env::var(SESSION_COOKIE_PATH_VAR).ok(),
            env::var(SESSION_COOKIE_SECURE_VAR).ok(),
        )
    }

    fn from_vars(
        name: Option<String>,
        path: Option<String>,
        secure: Option<String>,
    ) -> Result<Self, SessionError> {
        let name = name.ok_or_else(|| {
            SessionError::Config(format!("{SESSION_COOKIE_NAME_VAR} must be set"))
        })?;
        let path = path.unwrap_or_else(|| "/".to_string());
        let secure = secure
            .map(|val| val.to_lowercase() != "false")
            .unwrap_or(true);

        let options = Self { name, path, secure };
        options.validate()?;
        Ok(options)
    }

    /// Reject names and paths that cannot be rendered into a `Set-Cookie` header.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.name.is_empty() {
            return Err(SessionError::Config("cookie name is empty".to_string()));
        }
        if self
            .name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "()<>@,;:\\\"/[]?={}".contains(c))
        {
            return Err(SessionError::Config(format!(
                "cookie name {:?} contains a separator",
                self.name
            )));
        }
        if !self.path.starts_with('/') || self.path.contains(';') {
            return Err(SessionError::Config(format!(
                "cookie path {:?} must start with '/' and contain no ';'",
                self.path
            )));
        }
        Ok(())
    }
}
