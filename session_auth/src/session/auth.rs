use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, SET_COOKIE, USER_AGENT};
use http::request::Parts;
use http::Extensions;

use super::cookie::{CookieError, SessionCookie, get_cookie_value};
use super::service::{SessionService, SessionServiceOptions};
use super::types::{NewSession, Session};
use crate::config::CookieOptions;
use crate::encrypter::ReversibleEncoder;
use crate::errors::SessionError;
use crate::generator::TokenSource;
use crate::storage::SessionStore;

/// Attribute key checked by [`bind_user_agent`]
pub const USER_AGENT_ATTRIBUTE: &str = "user_agent";

/// Extra check run on every freshly resolved session.
///
/// Any error returned is handed back to the caller as is. Hooks may record
/// request-scoped data in `extensions`.
#[async_trait]
pub trait ValidateHook: Send + Sync + 'static {
    async fn validate(
        &self,
        extensions: &mut Extensions,
        request: &Parts,
        session: &Session,
    ) -> Result<(), SessionError>;
}

#[async_trait]
impl<F> ValidateHook for F
where
    F: Fn(&mut Extensions, &Parts, &Session) -> Result<(), SessionError> + Send + Sync + 'static,
{
    async fn validate(
        &self,
        extensions: &mut Extensions,
        request: &Parts,
        session: &Session,
    ) -> Result<(), SessionError> {
        (self)(extensions, request, session)
    }
}

/// Accept every session.
pub fn allow_all(
    _extensions: &mut Extensions,
    _request: &Parts,
    _session: &Session,
) -> Result<(), SessionError> {
    Ok(())
}

/// Reject a session whose stored user agent differs from the request's
/// `User-Agent`. Sessions without the attribute are accepted.
pub fn bind_user_agent(
    _extensions: &mut Extensions,
    request: &Parts,
    session: &Session,
) -> Result<(), SessionError> {
    let Some(expected) = session.attribute(USER_AGENT_ATTRIBUTE) else {
        return Ok(());
    };

    let actual = request
        .headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok());

    if expected.as_str() == actual {
        Ok(())
    } else {
        tracing::warn!(user_id = %session.user_id, "User agent does not match session");
        Err(SessionError::Rejected("user agent mismatch".to_string()))
    }
}

/// Wrap a closure as a shareable hook.
pub fn validate_with<F>(hook: F) -> Arc<dyn ValidateHook>
where
    F: Fn(&mut Extensions, &Parts, &Session) -> Result<(), SessionError> + Send + Sync + 'static,
{
    Arc::new(hook)
}

/// Where a request stands with respect to its session.
#[derive(Debug, Clone, Default)]
pub enum Resolution {
    #[default]
    Unresolved,
    Resolved(Session),
    Failed(SessionError),
}

/// Per-request state: memoized session, hook extensions and outgoing cookies.
///
/// Create one per request and merge its headers into the response with
/// [`RequestScope::apply_to`].
#[derive(Debug, Default)]
pub struct RequestScope {
    resolution: Resolution,
    extensions: Extensions,
    response_headers: HeaderMap,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.resolution {
            Resolution::Resolved(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.resolution, Resolution::Unresolved)
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn take_response_headers(&mut self) -> HeaderMap {
        std::mem::take(&mut self.response_headers)
    }

    /// Move the queued headers into `headers`, appending rather than replacing.
    pub fn apply_to(&mut self, headers: &mut HeaderMap) {
        let queued = self.take_response_headers();
        for (name, value) in queued.iter() {
            headers.append(name.clone(), value.clone());
        }
    }

    /// Queue `cookie`, replacing any session cookie queued earlier in this request.
    fn set_cookie(&mut self, cookie: &SessionCookie) -> Result<(), SessionError> {
        self.response_headers
            .insert(SET_COOKIE, cookie.to_http_header()?);
        Ok(())
    }
}

/// Construction options for [`Auth`]. All are required.
#[derive(Clone)]
pub struct AuthOptions {
    pub store: Arc<dyn SessionStore>,
    pub encrypter: Arc<dyn ReversibleEncoder>,
    pub generator: Arc<dyn TokenSource>,
    pub cookie_options: CookieOptions,
    pub validate: Arc<dyn ValidateHook>,
}

/// Request-facing session orchestration.
///
/// Binds the [`SessionService`] to one request/response cycle through a
/// [`RequestScope`], running the validate hook on every fresh resolution.
#[derive(Clone)]
pub struct Auth {
    service: SessionService,
    validate: Arc<dyn ValidateHook>,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl Auth {
    pub fn new(options: AuthOptions) -> Result<Self, SessionError> {
        let service = SessionService::new(SessionServiceOptions {
            store: options.store,
            encrypter: options.encrypter,
            generator: options.generator,
            cookie_options: options.cookie_options,
        })?;

        Ok(Self {
            service,
            validate: options.validate,
        })
    }

    pub fn service(&self) -> &SessionService {
        &self.service
    }

    /// Create a session and queue its cookie in `scope`.
    ///
    /// If the cookie cannot be built, the stored session is removed again and
    /// the empty cookie is queued instead.
    pub async fn create_new_session(
        &self,
        scope: &mut RequestScope,
        new_session: NewSession,
    ) -> Result<Session, SessionError> {
        let session = self.service.create_session(new_session).await?;

        if let Err(e) = self.issue_cookie(scope, &session) {
            if let Err(delete_err) = self.service.delete_session(&session.session_id).await {
                tracing::warn!("Failed to remove session after cookie error: {}", delete_err);
            }
            return Err(e);
        }

        scope.resolution = Resolution::Resolved(session.clone());
        Ok(session)
    }

    /// Resolve the request's session, at most once per scope.
    ///
    /// The outcome is memoized, so later calls return the same session or the
    /// same error without decrypting, reading the store or running the hook.
    pub async fn get_session(
        &self,
        scope: &mut RequestScope,
        request: &Parts,
    ) -> Result<Session, SessionError> {
        match &scope.resolution {
            Resolution::Resolved(session) => return Ok(session.clone()),
            Resolution::Failed(err) => return Err(err.clone()),
            Resolution::Unresolved => {}
        }

        let result = self.resolve(scope, request).await;
        scope.resolution = match &result {
            Ok(session) => Resolution::Resolved(session.clone()),
            Err(err) => Resolution::Failed(err.clone()),
        };
        result
    }

    /// Resolve the session and extend it to `desired`, clamped to `refresh_until`.
    pub async fn get_session_and_refresh(
        &self,
        scope: &mut RequestScope,
        request: &Parts,
        desired: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        let mut session = self.get_session(scope, request).await?;

        session.expires_at = session.clamp_expiry(desired);
        self.service.update_session(&session).await?;
        scope.resolution = Resolution::Resolved(session.clone());

        self.issue_cookie(scope, &session)?;
        tracing::debug!(expires_at = %session.expires_at, "Refreshed session");
        Ok(session)
    }

    /// Sign the request out.
    ///
    /// A request without a usable session is a no-op. A store failure while
    /// deleting is returned.
    pub async fn invalidate_session(
        &self,
        scope: &mut RequestScope,
        request: &Parts,
    ) -> Result<(), SessionError> {
        let session = match self.get_session(scope, request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("No session to invalidate: {}", e);
                return Ok(());
            }
        };

        self.service.delete_session(&session.session_id).await?;
        scope.set_cookie(&self.service.empty_cookie())?;
        scope.resolution = Resolution::Failed(SessionError::NotFound);

        tracing::info!(user_id = %session.user_id, "Invalidated session");
        Ok(())
    }

    async fn resolve(
        &self,
        scope: &mut RequestScope,
        request: &Parts,
    ) -> Result<Session, SessionError> {
        let cookie_name = &self.service.cookie_options().name;
        let Some(cookie_value) = get_cookie_value(&request.headers, cookie_name) else {
            return Err(SessionError::NotFound);
        };

        let session = match self.service.get_session_from_cookie(&cookie_value).await {
            Ok(session) => session,
            Err(e) => {
                if e.is_unauthenticated() {
                    tracing::debug!("Clearing unusable session cookie: {}", e);
                    if let Err(cookie_err) = scope.set_cookie(&self.service.empty_cookie()) {
                        tracing::warn!("Failed to queue empty cookie: {}", cookie_err);
                    }
                }
                return Err(e);
            }
        };

        self.validate
            .validate(&mut scope.extensions, request, &session)
            .await?;

        Ok(session)
    }

    fn issue_cookie(&self, scope: &mut RequestScope, session: &Session) -> Result<(), SessionError> {
        match self.service.create_cookie(session) {
            Ok(cookie) => scope.set_cookie(&cookie),
            Err(CookieError { cookie, source }) => {
                scope.set_cookie(&cookie)?;
                Err(source)
            }
        }
    }
}
