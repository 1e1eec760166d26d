mod auth;
mod cookie;
mod service;
mod types;


pub use auth::{
    Auth, AuthOptions, RequestScope, Resolution, USER_AGENT_ATTRIBUTE, ValidateHook, allow_all,
    bind_user_agent, validate_with,
};
pub use cookie::{CookieError, SessionCookie};
pub use service::{SessionService, SessionServiceOptions};
pub use types::{NewSession, Session};
