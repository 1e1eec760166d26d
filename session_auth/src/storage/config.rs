use std::env;
use std::sync::{Arc, LazyLock};

use super::errors::StorageError;
use super::types::{
    InMemorySessionStore, PostgresSessionStore, RedisSessionStore, SessionStore,
    SqliteSessionStore,
};

pub(crate) const SESSION_TABLE_PREFIX_VAR: &str = "SESSION_TABLE_PREFIX";
pub(crate) const SESSION_STORE_TYPE_VAR: &str = "SESSION_STORE_TYPE";
pub(crate) const SESSION_STORE_URL_VAR: &str = "SESSION_STORE_URL";

/// Session table name, `{SESSION_TABLE_PREFIX}sessions` (prefix defaults to `sa_`)
pub static DB_TABLE_SESSIONS: LazyLock<String> = LazyLock::new(|| {
    let prefix = env::var(SESSION_TABLE_PREFIX_VAR).unwrap_or_else(|_| "sa_".to_string());
    session_table_name(&prefix)
});

pub(crate) fn session_table_name(prefix: &str) -> String {
    format!("{prefix}sessions")
}

/// Build and initialize the store selected by `SESSION_STORE_TYPE`.
///
/// Supported types are `memory` (default), `sqlite`, `postgres` and `redis`.
/// All but `memory` require `SESSION_STORE_URL`.
pub async fn store_from_env() -> Result<Arc<dyn SessionStore>, StorageError> {
    let store_type = env::var(SESSION_STORE_TYPE_VAR).unwrap_or_else(|_| "memory".to_string());
    let store_url = || {
        env::var(SESSION_STORE_URL_VAR).map_err(|_| {
            StorageError::Storage(format!(
                "{SESSION_STORE_URL_VAR} must be set for store type '{store_type}'"
            ))
        })
    };

    tracing::info!("Initializing session store with type: {}", store_type);

    let store: Arc<dyn SessionStore> = match store_type.as_str() {
        "memory" => Arc::new(InMemorySessionStore::new()),
        "sqlite" => Arc::new(SqliteSessionStore::connect(&store_url()?).await?),
        "postgres" => Arc::new(PostgresSessionStore::connect(&store_url()?).await?),
        "redis" => Arc::new(RedisSessionStore::open(&store_url()?)?),
        other => {
            return Err(StorageError::Storage(format!(
                "Unsupported store type: {other}. Supported types are 'memory', 'sqlite', 'postgres' and 'redis'"
            )));
        }
    };

    store.init().await?;
    tracing::info!("Connected to session store: type={}", store_type);

    Ok(store)
}
