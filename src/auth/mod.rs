//! Authentication Module
//! Mission: JWT identity tokens, access gate, role gate

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use api::AuthState;
pub use jwt::JwtHandler;
pub use middleware::{access_gate, role_gate, AccessGate, AuthError, CurrentUser};
pub use models::{Role, User};
pub use user_store::{UserStore, MIN_BCRYPT_COST};
