//! House Hunt Backend Library
//!
//! Rental listings REST API: accounts with owner/tenant roles, JWT access
//! gate, and a filterable listing catalogue over SQLite.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod listings;
pub mod middleware;

pub use api::{create_router, AppState};
pub use config::Config;
