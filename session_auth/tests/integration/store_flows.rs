use std::sync::Arc;

use chrono::Duration;
use http::HeaderMap;
use session_auth::{
    InMemorySessionStore, PostgresSessionStore, RedisSessionStore, RequestScope, SessionError,
    SessionStore, allow_all,
};

use crate::common::{MockBrowser, auth_with, now_secs, sqlite_store, standard_session};

/// Sign in, refresh, read back and sign out against `store`
async fn exercise_store(store: Arc<dyn SessionStore>) {
    let auth = auth_with(store.clone(), Arc::new(allow_all));
    let mut browser = MockBrowser::new();

    let mut scope = RequestScope::new();
    let session = auth
        .create_new_session(
            &mut scope,
            standard_session("alice").with_attribute("ip", "192.0.2.1"),
        )
        .await
        .unwrap();
    let mut headers = HeaderMap::new();
    scope.apply_to(&mut headers);
    browser.absorb(&headers);

    let target = now_secs() + Duration::hours(3);
    let refreshed = auth
        .get_session_and_refresh(&mut RequestScope::new(), &browser.request("/"), target)
        .await
        .unwrap();
    assert_eq!(refreshed.expires_at, target);

    let stored = store.get_session(&session.session_id).await.unwrap().unwrap();
    assert_eq!(stored.expires_at, target);
    assert_eq!(
        stored.attribute("ip").and_then(|v| v.as_str()),
        Some("192.0.2.1")
    );

    auth.invalidate_session(&mut RequestScope::new(), &browser.request("/"))
        .await
        .unwrap();
    assert!(store.get_session(&session.session_id).await.unwrap().is_none());
}

/// Three sessions for one user and one for another; bulk delete hits only the first user
async fn exercise_bulk_delete(store: Arc<dyn SessionStore>) {
    let auth = auth_with(store.clone(), Arc::new(allow_all));
    let service = auth.service();

    let mut alice = Vec::new();
    for _ in 0..3 {
        alice.push(service.create_session(standard_session("alice")).await.unwrap());
    }
    let bob = service.create_session(standard_session("bob")).await.unwrap();

    service.delete_sessions_by_user_id("alice").await.unwrap();

    for session in &alice {
        assert!(store.get_session(&session.session_id).await.unwrap().is_none());
    }
    assert!(store.get_session(&bob.session_id).await.unwrap().is_some());
}

/// Expired records still in the store are reported as expired
async fn exercise_expiry(store: Arc<dyn SessionStore>) {
    let auth = auth_with(store.clone(), Arc::new(allow_all));
    let now = now_secs();
    let session = auth
        .service()
        .create_session(session_auth::NewSession::new(
            "alice",
            now + Duration::seconds(30),
            now + Duration::hours(1),
        ))
        .await
        .unwrap();

    let result = auth
        .service()
        .get_session_at(&session.session_id, now + Duration::seconds(30))
        .await;
    assert!(matches!(result, Err(SessionError::Expired { .. })));
    assert!(store.get_session(&session.session_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_memory_store_flows() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    exercise_store(store.clone()).await;
    exercise_bulk_delete(store.clone()).await;
    exercise_expiry(store).await;
}

#[tokio::test]
async fn test_sqlite_store_flows() {
    let store: Arc<dyn SessionStore> = sqlite_store().await;
    exercise_store(store.clone()).await;
    exercise_bulk_delete(store.clone()).await;
    exercise_expiry(store).await;
}

/// Updating a record another request already removed reports NotFound
#[tokio::test]
async fn test_sqlite_update_after_delete() {
    let store: Arc<dyn SessionStore> = sqlite_store().await;
    let auth = auth_with(store.clone(), Arc::new(allow_all));
    let session = auth
        .service()
        .create_session(standard_session("alice"))
        .await
        .unwrap();

    store.delete_session(&session.session_id).await.unwrap();

    let result = auth.service().update_session(&session).await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

/// `SESSION_STORE_URL` when it points at the given backend
fn backend_url(schemes: &[&str]) -> Option<String> {
    std::env::var("SESSION_STORE_URL")
        .ok()
        .filter(|url| schemes.iter().any(|scheme| url.starts_with(scheme)))
}

#[tokio::test]
#[ignore = "requires a Redis server in SESSION_STORE_URL"]
async fn test_redis_store_flows() {
    let Some(url) = backend_url(&["redis://", "rediss://"]) else {
        return;
    };
    let redis = RedisSessionStore::open(&url).unwrap();
    redis.init().await.unwrap();
    let store: Arc<dyn SessionStore> = Arc::new(redis);

    exercise_store(store.clone()).await;
    exercise_bulk_delete(store.clone()).await;
    exercise_expiry(store).await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server in SESSION_STORE_URL"]
async fn test_postgres_store_flows() {
    let Some(url) = backend_url(&["postgres://", "postgresql://"]) else {
        return;
    };
    let pool = sqlx::PgPool::connect(&url).await.unwrap();
    let postgres = PostgresSessionStore::with_table(pool, "it_sessions").unwrap();
    postgres.init().await.unwrap();
    let store: Arc<dyn SessionStore> = Arc::new(postgres);

    exercise_store(store.clone()).await;
    exercise_bulk_delete(store.clone()).await;
    exercise_expiry(store.clone()).await;

    // Update of a removed record reports NotFound, as with SQLite
    let auth = auth_with(store.clone(), Arc::new(allow_all));
    let session = auth
        .service()
        .create_session(standard_session("carol"))
        .await
        .unwrap();
    store.delete_session(&session.session_id).await.unwrap();
    assert!(matches!(
        auth.service().update_session(&session).await,
        Err(SessionError::NotFound)
    ));
}
