//! SQLite Database Handle
//! Mission: One connection, one schema, shared by the user and listing stores
//!
//! - WAL mode for concurrent reads during writes
//! - Foreign keys enforced so a listing always references a real account
//! - Indexes on the columns the listing filters touch

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::sync::Arc;
use tracing::info;

pub type SharedConnection = Arc<Mutex<Connection>>;

const PRAGMAS_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#;

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('owner', 'tenant')),
    phone TEXT,
    location TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS listings (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    location TEXT NOT NULL,
    location_folded TEXT NOT NULL,
    price INTEGER NOT NULL CHECK (price >= 0),
    bedrooms INTEGER NOT NULL CHECK (bedrooms >= 1),
    description TEXT NOT NULL,
    image_url TEXT NOT NULL,
    contact TEXT NOT NULL,
    owner_id TEXT NOT NULL REFERENCES users(id),
    available INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_location ON listings(location_folded);
CREATE INDEX IF NOT EXISTS idx_listings_price ON listings(price);
CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings(owner_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_listings_recent ON listings(available, created_at DESC);
"#;

/// Open (or create) the database file and apply the schema
pub fn open(db_path: &str) -> Result<SharedConnection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

    let conn = Connection::open_with_flags(db_path, flags)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.execute_batch(PRAGMAS_SQL)
        .context("Failed to apply database pragmas")?;
    init_schema(&conn)?;

    info!(path = db_path, "Database ready");
    Ok(Arc::new(Mutex::new(conn)))
}

/// Fresh in-memory database, used by tests
pub fn in_memory() -> Result<SharedConnection> {
    let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Cheap liveness probe for the health endpoint
pub fn ping(conn: &SharedConnection) -> bool {
    conn.lock()
        .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .is_ok()
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)
        .context("Failed to initialize database schema")
}
