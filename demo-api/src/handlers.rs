use axum::{
    Json,
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use http::header::USER_AGENT;
use serde::Serialize;

use session_auth::{Auth, NewSession, RequestScope, Session, SessionError, USER_AGENT_ATTRIBUTE};

const MAX_SIGNIN_BODY: usize = 1024;

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    user_id: String,
    expires_at: DateTime<Utc>,
    refresh_until: DateTime<Utc>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            expires_at: session.expires_at,
            refresh_until: session.refresh_until,
        }
    }
}

/// Attach the cookies queued in `scope` to `response`
fn finish(mut scope: RequestScope, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    scope.apply_to(response.headers_mut());
    response
}

fn error_status(err: &SessionError) -> StatusCode {
    match err {
        e if e.is_unauthenticated() => StatusCode::UNAUTHORIZED,
        SessionError::Rejected(_) => StatusCode::UNAUTHORIZED,
        SessionError::InvalidSession(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /signin with the user id as the request body
pub(crate) async fn signin(State(auth): State<Auth>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let mut scope = RequestScope::new();

    let user_id = match to_bytes(body, MAX_SIGNIN_BODY).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(e) => {
            tracing::debug!("Failed to read sign-in body: {}", e);
            return finish(scope, StatusCode::BAD_REQUEST);
        }
    };
    if user_id.is_empty() {
        return finish(scope, (StatusCode::BAD_REQUEST, "user id required"));
    }

    let now = Utc::now();
    let mut new_session =
        NewSession::new(user_id, now + Duration::hours(1), now + Duration::hours(24));
    if let Some(user_agent) = parts.headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
        new_session = new_session.with_attribute(USER_AGENT_ATTRIBUTE, user_agent);
    }

    match auth.create_new_session(&mut scope, new_session).await {
        Ok(session) => finish(scope, Json(SessionView::from(session))),
        Err(e) => {
            tracing::error!("Sign-in failed: {}", e);
            let status = error_status(&e);
            finish(scope, status)
        }
    }
}

/// GET / returns the current session, extended by one hour
pub(crate) async fn index(State(auth): State<Auth>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    let mut scope = RequestScope::new();

    let desired = Utc::now() + Duration::hours(1);
    match auth
        .get_session_and_refresh(&mut scope, &parts, desired)
        .await
    {
        Ok(session) => finish(scope, Json(SessionView::from(session))),
        Err(e) => {
            tracing::debug!("No usable session: {}", e);
            let status = error_status(&e);
            finish(scope, status)
        }
    }
}

/// POST /signout
pub(crate) async fn signout(State(auth): State<Auth>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    let mut scope = RequestScope::new();

    match auth.invalidate_session(&mut scope, &parts).await {
        Ok(()) => finish(scope, StatusCode::NO_CONTENT),
        Err(e) => {
            tracing::error!("Sign-out failed: {}", e);
            finish(scope, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
