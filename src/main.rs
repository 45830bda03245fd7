//! House Hunt - rental listings API server
//! Mission: Owners publish houses, tenants find them

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use house_hunt_backend::{
    api::{create_router, AppState},
    auth::{AuthState, JwtHandler, UserStore},
    config::{self, Config},
    db,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    config::load_env();
    init_tracing();

    let config = Config::parse();

    info!("🏠 House Hunt API starting");

    if config.uses_dev_secret() {
        warn!("JWT_SECRET not set, using the development secret; do not run like this in production");
    }

    let db_path = config.resolved_database_path();
    let conn = db::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;
    info!("📁 Database ready at {}", db_path);

    let user_store = Arc::new(UserStore::with_cost(conn.clone(), config.bcrypt_cost));
    let jwt_handler = Arc::new(JwtHandler::with_ttl(
        &config.jwt_secret,
        Duration::hours(config.jwt_ttl_hours),
    ));
    let state = AppState::new(conn, AuthState::new(user_store, jwt_handler));

    let app = create_router(state, &config.client_url);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 API server listening on {}", addr);
    info!("CORS origin: {}", config.client_url);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "house_hunt_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
