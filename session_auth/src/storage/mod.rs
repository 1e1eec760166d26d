mod config;
mod errors;
mod memory;
mod postgres;
mod redis;
mod sqlite;
mod types;

pub use config::{DB_TABLE_SESSIONS, store_from_env};
pub use errors::StorageError;
pub use types::{
    InMemorySessionStore, PostgresSessionStore, RedisSessionStore, SessionStore,
    SqliteSessionStore,
};
