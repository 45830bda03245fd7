//! Application configuration
//!
//! Every option can be given as a flag or an environment variable; `.env`
//! files are loaded first by `load_env`.

use crate::auth::{jwt::DEFAULT_TTL_HOURS, MIN_BCRYPT_COST};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Ten years
pub const MAX_TTL_HOURS: i64 = 87_600;

/// Highest work factor bcrypt supports
pub const MAX_BCRYPT_COST: u32 = 31;

pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

/// House Hunt rental listings API
#[derive(Parser, Debug, Clone)]
#[command(name = "house-hunt")]
#[command(about = "REST backend for rental listings with JWT auth")]
pub struct Config {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5001)]
    pub port: u16,

    /// SQLite database file; relative paths are anchored at the crate directory
    #[arg(long, env = "DATABASE_PATH", default_value = "house_hunt.db")]
    pub database_path: String,

    /// HMAC secret for signing tokens
    #[arg(long, env = "JWT_SECRET", default_value = DEV_JWT_SECRET, hide_env_values = true)]
    pub jwt_secret: String,

    /// Token lifetime in hours
    #[arg(
        long,
        env = "JWT_TTL_HOURS",
        default_value_t = DEFAULT_TTL_HOURS,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TTL_HOURS)
    )]
    pub jwt_ttl_hours: i64,

    /// bcrypt work factor for password hashes
    #[arg(
        long,
        env = "BCRYPT_COST",
        default_value_t = bcrypt::DEFAULT_COST,
        value_parser = clap::value_parser!(u32).range(MIN_BCRYPT_COST as i64..=MAX_BCRYPT_COST as i64)
    )]
    pub bcrypt_cost: u32,

    /// Origin allowed by CORS (the frontend)
    #[arg(long, env = "CLIENT_URL", default_value = "http://localhost:3000")]
    pub client_url: String,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn resolved_database_path(&self) -> String {
        resolve_data_path(&self.database_path)
    }
}

/// Load `.env` from the working directory (and parents), then from the
/// crate directory.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

fn resolve_data_path(raw: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let p = PathBuf::from(raw);
    if p.is_absolute() || raw == ":memory:" {
        return raw.to_string();
    }

    // Treat relative paths as relative to the crate, not the caller's cwd.
    base.join(p).to_string_lossy().to_string()
}
