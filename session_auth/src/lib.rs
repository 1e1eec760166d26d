//! session_auth - Server-side session lifecycle bound to an encrypted cookie
//!
//! This crate mints, validates, refreshes and invalidates server-side sessions.
//! Persistence, token generation and cookie encryption are pluggable
//! collaborators ([`SessionStore`], [`TokenSource`], [`ReversibleEncoder`]);
//! [`SessionService`] orchestrates them and [`Auth`] binds the service to one
//! request/response cycle through an explicit [`RequestScope`].

mod config;
mod encrypter;
mod errors;
mod generator;
mod session;
mod storage;
mod utils;


pub use config::{
    CookieOptions, SESSION_COOKIE_NAME_VAR, SESSION_COOKIE_PATH_VAR, SESSION_COOKIE_SECURE_VAR,
};
pub use encrypter::{AesGcmEncrypter, ReversibleEncoder};
pub use errors::SessionError;
pub use generator::{RandomTokenGenerator, TokenEncoding, TokenSource};

pub use session::{
    Auth, AuthOptions, CookieError, NewSession, RequestScope, Resolution, Session, SessionCookie,
    SessionService, SessionServiceOptions, USER_AGENT_ATTRIBUTE, ValidateHook, allow_all,
    bind_user_agent, validate_with,
};

pub use storage::{
    DB_TABLE_SESSIONS, InMemorySessionStore, PostgresSessionStore, RedisSessionStore,
    SessionStore, SqliteSessionStore, StorageError, store_from_env,
};
