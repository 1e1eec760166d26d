use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use headers::HeaderMapExt;
use http::header::{HeaderMap, HeaderValue, SET_COOKIE};
use thiserror::Error;

use crate::config::CookieOptions;
use crate::errors::SessionError;

const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A `Set-Cookie` value carrying an encrypted session id.
///
/// `HttpOnly` and `SameSite=Lax` are always emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub secure: bool,
    pub expires: DateTime<Utc>,
}

impl SessionCookie {
    pub(crate) fn new(
        options: &CookieOptions,
        value: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            name: options.name.clone(),
            value: value.into(),
            path: options.path.clone(),
            secure: options.secure,
            expires,
        }
    }

    /// The cookie a client should store to forget its session.
    pub(crate) fn empty(options: &CookieOptions) -> Self {
        Self::new(options, "", DateTime::<Utc>::from(UNIX_EPOCH))
    }

    pub fn http_only(&self) -> bool {
        true
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Seconds until `expires`, floored at zero.
    pub fn max_age_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires - now).num_seconds().max(0)
    }

    pub fn to_header_value(&self) -> String {
        self.to_header_value_at(Utc::now())
    }

    pub fn to_header_value_at(&self, now: DateTime<Utc>) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Expires={}; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name,
            self.value,
            self.path,
            self.expires.format(COOKIE_DATE_FORMAT),
            self.max_age_at(now),
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn to_http_header(&self) -> Result<HeaderValue, SessionError> {
        HeaderValue::from_str(&self.to_header_value())
            .map_err(|e| SessionError::Cookie(format!("Failed to build Set-Cookie header: {e}")))
    }

    /// Add this cookie as one more `Set-Cookie` header.
    pub fn append_to(&self, headers: &mut HeaderMap) -> Result<(), SessionError> {
        headers.append(SET_COOKIE, self.to_http_header()?);
        Ok(())
    }
}

/// Cookie creation failed; `cookie` is the empty cookie so the caller can
/// still clear the client side.
#[derive(Debug, Error, Clone)]
#[error("{source}")]
pub struct CookieError {
    pub cookie: SessionCookie,
    #[source]
    pub source: SessionError,
}

/// Value of the cookie called `name`, if the request carries one.
pub(crate) fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let Some(cookies) = headers.typed_get::<headers::Cookie>() else {
        tracing::debug!("No cookie header found");
        return None;
    };

    let value = cookies.get(name).map(str::to_string);
    if value.is_none() {
        tracing::debug!("No session cookie '{}' found in cookies", name);
    }
    value
}
