//! Authentication Middleware
//! Mission: Resolve the caller's identity, then gate by role
//!
//! Protected routes stack two layers: `access_gate` verifies the bearer token
//! and attaches the `User` to the request, `role_gate` then checks that
//! user's role. Each stage either continues with the (enriched) request or
//! ends it with an `AuthError`.

use crate::auth::{
    jwt::JwtHandler,
    models::{Role, User},
    user_store::UserStore,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Token verification plus identity lookup
#[derive(Clone)]
pub struct AccessGate {
    jwt_handler: Arc<JwtHandler>,
    user_store: Arc<UserStore>,
}

impl AccessGate {
    pub fn new(jwt_handler: Arc<JwtHandler>, user_store: Arc<UserStore>) -> Self {
        Self {
            jwt_handler,
            user_store,
        }
    }

    /// Resolve the identity behind the request's bearer token
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let bearer = match headers.typed_get::<Authorization<Bearer>>() {
            Some(Authorization(bearer)) => bearer,
            None if headers.contains_key(AUTHORIZATION) => return Err(AuthError::InvalidFormat),
            None => return Err(AuthError::MissingToken),
        };

        let claims = self
            .jwt_handler
            .validate_token(bearer.token())
            .map_err(|e| {
                debug!("Token rejected: {:#}", e);
                AuthError::InvalidToken
            })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        match self.user_store.get_user_by_id(&user_id) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                debug!(%user_id, "Token references an unknown account");
                Err(AuthError::UnknownIdentity)
            }
            Err(e) => {
                error!("Identity lookup failed: {:#}", e);
                Err(AuthError::Internal)
            }
        }
    }
}

/// Auth middleware that validates JWT tokens
pub async fn access_gate(
    State(gate): State<AccessGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = gate.authenticate(req.headers())?;

    // Add the account to request extensions so handlers can access it
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Role middleware; the required role is the layer's state.
/// Must run after `access_gate`.
pub async fn role_gate(
    State(required): State<Role>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = extract_user(&req).ok_or(AuthError::MissingToken)?;
    require_role(user, required)?;
    Ok(next.run(req).await)
}

/// Pure role predicate behind `role_gate`
pub fn require_role(user: &User, required: Role) -> Result<(), AuthError> {
    match (required, user.role) {
        (Role::Owner, Role::Owner) | (Role::Tenant, Role::Tenant) => Ok(()),
        (Role::Owner, Role::Tenant) | (Role::Tenant, Role::Owner) => {
            debug!(user_id = %user.id, role = %user.role, %required, "Role gate denied");
            Err(AuthError::Forbidden { required })
        }
    }
}

/// Extract the resolved account from a request (use after `access_gate`)
pub fn extract_user(req: &Request) -> Option<&User> {
    req.extensions().get::<User>()
}

/// Handler extractor for the account attached by `access_gate`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::MissingToken)
    }
}

/// Auth error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    UnknownIdentity,
    Forbidden { required: Role },
    Internal,
}

/// Shared by every unauthenticated outcome so clients cannot tell them apart
pub const UNAUTHENTICATED_MESSAGE: &str = "Not authenticated: token missing, invalid or expired";

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidFormat
            | AuthError::InvalidToken
            | AuthError::UnknownIdentity => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidFormat
            | AuthError::InvalidToken
            | AuthError::UnknownIdentity => UNAUTHENTICATED_MESSAGE.to_string(),
            AuthError::Forbidden { required } => {
                let role = match required {
                    Role::Owner => "Owner",
                    Role::Tenant => "Tenant",
                };
                format!("Access denied. {} role required.", role)
            }
            AuthError::Internal => "Server error".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message(),
        }));
        (self.status(), body).into_response()
    }
}
