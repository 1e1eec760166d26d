use std::sync::Arc;

use chrono::Duration;
use http::HeaderMap;
use session_auth::{
    Auth, InMemorySessionStore, RequestScope, SessionError, USER_AGENT_ATTRIBUTE,
    bind_user_agent,
};

use crate::common::{COOKIE_NAME, MockBrowser, auth_with, memory_auth, now_secs, standard_session};

/// Headers a response for `scope` would carry
fn respond(scope: &mut RequestScope) -> HeaderMap {
    let mut headers = HeaderMap::new();
    scope.apply_to(&mut headers);
    headers
}

async fn sign_in(auth: &Auth, browser: &mut MockBrowser, user_id: &str) -> session_auth::Session {
    let mut scope = RequestScope::new();
    let session = auth
        .create_new_session(&mut scope, standard_session(user_id))
        .await
        .unwrap();
    browser.absorb(&respond(&mut scope));
    session
}

/// Test the complete sign-in, use, refresh and sign-out flow
/// 1. Signs in and checks the browser received the session cookie
/// 2. Resolves the session on a follow-up request
/// 3. Refreshes it and checks the re-issued cookie still works
/// 4. Signs out and checks the cookie is gone and the session unusable
#[tokio::test]
async fn test_full_session_lifecycle() {
    let auth = memory_auth();
    let mut browser = MockBrowser::new();

    let session = sign_in(&auth, &mut browser, "alice").await;
    let cookie = browser.cookie(COOKIE_NAME).unwrap().to_string();
    assert_ne!(cookie, session.session_id);

    let mut scope = RequestScope::new();
    let resolved = auth
        .get_session(&mut scope, &browser.request("/"))
        .await
        .unwrap();
    assert_eq!(resolved.session_id, session.session_id);
    assert!(respond(&mut scope).is_empty());

    let mut scope = RequestScope::new();
    let refreshed = auth
        .get_session_and_refresh(
            &mut scope,
            &browser.request("/"),
            now_secs() + Duration::hours(2),
        )
        .await
        .unwrap();
    browser.absorb(&respond(&mut scope));
    assert_eq!(refreshed.session_id, session.session_id);
    assert_ne!(browser.cookie(COOKIE_NAME).unwrap(), cookie);

    let mut scope = RequestScope::new();
    auth.invalidate_session(&mut scope, &browser.request("/signout"))
        .await
        .unwrap();
    browser.absorb(&respond(&mut scope));
    assert!(browser.cookie(COOKIE_NAME).is_none());

    let result = auth
        .get_session(&mut RequestScope::new(), &browser.request("/"))
        .await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

/// Refresh to now+2h is honored; refresh to now+48h is clamped to the 24h ceiling
#[tokio::test]
async fn test_refresh_clamp_through_requests() {
    let auth = memory_auth();
    let mut browser = MockBrowser::new();
    let session = sign_in(&auth, &mut browser, "alice").await;
    let now = session.refresh_until - Duration::hours(24);

    let mut scope = RequestScope::new();
    let first = auth
        .get_session_and_refresh(&mut scope, &browser.request("/"), now + Duration::hours(2))
        .await
        .unwrap();
    browser.absorb(&respond(&mut scope));
    assert_eq!(first.expires_at, now + Duration::hours(2));

    let mut scope = RequestScope::new();
    let second = auth
        .get_session_and_refresh(&mut scope, &browser.request("/"), now + Duration::hours(48))
        .await
        .unwrap();
    assert_eq!(second.expires_at, now + Duration::hours(24));
    assert_eq!(second.expires_at, session.refresh_until);
}

/// Sign-out twice, including without any cookie, never fails
#[tokio::test]
async fn test_double_sign_out() {
    let auth = memory_auth();
    let mut browser = MockBrowser::new();
    sign_in(&auth, &mut browser, "alice").await;
    let stale = browser.request("/signout");

    for _ in 0..2 {
        let mut scope = RequestScope::new();
        auth.invalidate_session(&mut scope, &stale).await.unwrap();
        browser.absorb(&respond(&mut scope));
    }
    auth.invalidate_session(&mut RequestScope::new(), &browser.request("/signout"))
        .await
        .unwrap();
}

/// A cookie for a session that no longer exists is cleared from the browser
#[tokio::test]
async fn test_stale_cookie_is_cleared() {
    let auth = memory_auth();
    let mut browser = MockBrowser::new();
    let session = sign_in(&auth, &mut browser, "alice").await;
    auth.service()
        .delete_session(&session.session_id)
        .await
        .unwrap();

    let mut scope = RequestScope::new();
    let err = auth
        .get_session(&mut scope, &browser.request("/"))
        .await
        .unwrap_err();
    browser.absorb(&respond(&mut scope));

    assert!(err.is_unauthenticated());
    assert!(browser.cookie(COOKIE_NAME).is_none());
}

/// A garbled cookie is unauthenticated and cleared
#[tokio::test]
async fn test_garbled_cookie() {
    let auth = memory_auth();
    let mut browser = MockBrowser::new();
    browser.set_cookie(COOKIE_NAME, "bm90LWEtcmVhbC1jb29raWU");

    let mut scope = RequestScope::new();
    let err = auth
        .get_session(&mut scope, &browser.request("/"))
        .await
        .unwrap_err();
    browser.absorb(&respond(&mut scope));

    assert!(matches!(err, SessionError::Decryption(_)));
    assert!(browser.cookie(COOKIE_NAME).is_none());
}

/// Signing a user out everywhere ends all three of their sessions and no one else's
#[tokio::test]
async fn test_sign_out_everywhere() {
    let auth = memory_auth();
    let mut alice_browsers: Vec<MockBrowser> = (0..3).map(|_| MockBrowser::new()).collect();
    for browser in alice_browsers.iter_mut() {
        sign_in(&auth, browser, "alice").await;
    }
    let mut bob = MockBrowser::new();
    sign_in(&auth, &mut bob, "bob").await;

    auth.service()
        .delete_sessions_by_user_id("alice")
        .await
        .unwrap();

    for browser in &alice_browsers {
        let result = auth
            .get_session(&mut RequestScope::new(), &browser.request("/"))
            .await;
        assert!(matches!(result, Err(SessionError::NotFound)));
    }
    let bob_session = auth
        .get_session(&mut RequestScope::new(), &bob.request("/"))
        .await
        .unwrap();
    assert_eq!(bob_session.user_id, "bob");
}

/// A cookie replayed from a different user agent is rejected by the binding hook
#[tokio::test]
async fn test_user_agent_bound_session() {
    let auth = auth_with(Arc::new(InMemorySessionStore::new()), Arc::new(bind_user_agent));
    let mut browser = MockBrowser::with_user_agent("Browser/1.0");

    let mut scope = RequestScope::new();
    auth.create_new_session(
        &mut scope,
        standard_session("alice").with_attribute(USER_AGENT_ATTRIBUTE, "Browser/1.0"),
    )
    .await
    .unwrap();
    browser.absorb(&respond(&mut scope));

    let mut attacker = MockBrowser::with_user_agent("curl/8.0");
    attacker.set_cookie(COOKIE_NAME, browser.cookie(COOKIE_NAME).unwrap());

    assert!(
        auth.get_session(&mut RequestScope::new(), &browser.request("/"))
            .await
            .is_ok()
    );
    let result = auth
        .get_session(&mut RequestScope::new(), &attacker.request("/"))
        .await;
    assert!(matches!(result, Err(SessionError::Rejected(_))));
}

/// One Auth shared across concurrent request tasks
#[tokio::test]
async fn test_concurrent_requests_share_auth() {
    let auth = Arc::new(memory_auth());
    let mut browser = MockBrowser::new();
    let session = sign_in(&auth, &mut browser, "alice").await;
    let browser = Arc::new(browser);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let auth = auth.clone();
            let browser = browser.clone();
            tokio::spawn(async move {
                let mut scope = RequestScope::new();
                auth.get_session(&mut scope, &browser.request("/")).await
            })
        })
        .collect();

    for handle in handles {
        let resolved = handle.await.unwrap().unwrap();
        assert_eq!(resolved.session_id, session.session_id);
    }
}
