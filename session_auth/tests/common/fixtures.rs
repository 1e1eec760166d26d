use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, Utc};
use session_auth::{
    AesGcmEncrypter, Auth, AuthOptions, CookieOptions, InMemorySessionStore, NewSession,
    RandomTokenGenerator, SessionStore, SqliteSessionStore, ValidateHook, allow_all,
};
use sqlx::sqlite::SqlitePoolOptions;

pub const COOKIE_NAME: &str = "it_session";

/// Current time truncated to whole seconds
pub fn now_secs() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(Duration::seconds(1)).unwrap_or(now)
}

pub fn auth_with(store: Arc<dyn SessionStore>, validate: Arc<dyn ValidateHook>) -> Auth {
    Auth::new(AuthOptions {
        store,
        encrypter: Arc::new(AesGcmEncrypter::new("integration-secret").unwrap()),
        generator: Arc::new(RandomTokenGenerator::base32(15)),
        cookie_options: CookieOptions::new(COOKIE_NAME, "/", true),
        validate,
    })
    .unwrap()
}

pub fn memory_auth() -> Auth {
    auth_with(Arc::new(InMemorySessionStore::new()), Arc::new(allow_all))
}

/// SQLite store on a private in-memory database
pub async fn sqlite_store() -> Arc<SqliteSessionStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteSessionStore::with_table(pool, "it_sessions").unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

/// One hour of validity inside a 24 hour refresh window
pub fn standard_session(user_id: &str) -> NewSession {
    let now = now_secs();
    NewSession::new(user_id, now + Duration::hours(1), now + Duration::hours(24))
}
