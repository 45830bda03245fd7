//! HTTP middleware shared by all routes.
//!
//! Authentication and role gates live in `crate::auth::middleware`.

pub mod logging;

pub use logging::request_logging;
