use std::env;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use dotenvy::dotenv;

use session_auth::{
    AesGcmEncrypter, Auth, AuthOptions, CookieOptions, RandomTokenGenerator, bind_user_agent,
    store_from_env,
};

mod handlers;
mod server;

use crate::{
    handlers::{index, signin, signout},
    server::{init_tracing, serve},
};

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing("demo_api");

    let secret = env::var("SESSION_SECRET").map_err(|_| "SESSION_SECRET must be set")?;

    let auth = Auth::new(AuthOptions {
        store: store_from_env().await?,
        encrypter: Arc::new(AesGcmEncrypter::new(&secret)?),
        generator: Arc::new(RandomTokenGenerator::base32(15)),
        cookie_options: CookieOptions::from_env()?,
        validate: Arc::new(bind_user_agent),
    })?;

    let app = Router::new()
        .route("/", get(index))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .with_state(auth);

    let port = env::var("DEMO_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    serve(port, app).await?;
    Ok(())
}
