//! Authentication API Endpoints
//! Mission: Registration, login and the caller's own profile

use crate::api::error::ApiError;
use crate::auth::{
    jwt::JwtHandler,
    middleware::{AccessGate, AuthError, CurrentUser},
    models::{
        AuthResponse, LoginRequest, MeResponse, RegisterRequest, UpdateProfileRequest, User,
        UserResponse, MIN_PASSWORD_LEN,
    },
    user_store::UserStore,
};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }

    /// Access gate backed by this state's token handler and user store
    pub fn access_gate(&self) -> AccessGate {
        AccessGate::new(self.jwt_handler.clone(), self.user_store.clone())
    }

    fn token_response(&self, user: &User) -> Result<AuthResponse, ApiError> {
        let (token, expires_in) = self.jwt_handler.generate_token(user)?;
        Ok(AuthResponse {
            success: true,
            token,
            expires_in,
            user: UserResponse::from_user(user),
        })
    }
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(payload) = payload?;
    let new_user = payload.validate().map_err(ApiError::Validation)?;
    let email = new_user.email.clone();

    let user = state.user_store.create_user(new_user)?.ok_or_else(|| {
        warn!(email = %email, "Registration with existing email");
        ApiError::Conflict("User already exists with this email".to_string())
    })?;

    info!(user_id = %user.id, role = %user.role, "Registration successful");

    Ok((StatusCode::CREATED, Json(state.token_response(&user)?)))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;

    let Some(user) = state
        .user_store
        .verify_credentials(&payload.email, &payload.password)?
    else {
        warn!(email = %payload.email, "Failed login attempt");
        return Err(ApiError::InvalidCredentials);
    };

    info!(user_id = %user.id, role = %user.role, "Login successful");

    Ok(Json(state.token_response(&user)?))
}

/// Current user - GET /api/auth/me
pub async fn get_current_user(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user: UserResponse::from_user(&user),
    })
}

/// Update own profile - PATCH /api/auth/me
/// Location can be set or cleared; a password change needs the current one.
pub async fn update_current_user(
    State(state): State<AuthState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<MeResponse>, ApiError> {
    let Json(payload) = payload?;

    if payload.location.is_none() && payload.password.is_none() {
        return Err(ApiError::Validation(
            "Provide a location or a new password".to_string(),
        ));
    }

    if let Some(password) = &payload.password {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let current = payload.current_password.as_deref().unwrap_or_default();
        if state
            .user_store
            .verify_credentials(&user.email, current)?
            .is_none()
        {
            warn!(user_id = %user.id, "Password change with wrong current password");
            return Err(ApiError::InvalidCredentials);
        }

        state.user_store.update_password(&user.id, password)?;
    }

    if let Some(location) = &payload.location {
        let location = location.trim();
        let location = (!location.is_empty()).then_some(location);
        state.user_store.update_location(&user.id, location)?;
    }

    let refreshed = state
        .user_store
        .get_user_by_id(&user.id)?
        .ok_or(ApiError::Auth(AuthError::UnknownIdentity))?;

    Ok(Json(MeResponse {
        success: true,
        user: UserResponse::from_user(&refreshed),
    }))
}
