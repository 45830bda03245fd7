//! Authentication Models
//! Mission: Define identities, roles and the token payload

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

/// Account roles. Closed set: owners list properties, tenants browse them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Tenant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Tenant => "tenant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "tenant" => Some(Role::Tenant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub iat: usize,  // issued-at timestamp
    pub exp: usize,  // expiration timestamp
}

/// Fields accepted at registration, after validation
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub location: Option<String>,
}

/// Registration request body.
///
/// Every field is optional at the serde level so that a missing field
/// surfaces as a validation message instead of a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}

pub const MIN_PASSWORD_LEN: usize = 6;

impl RegisterRequest {
    /// Check required fields and normalise the email address.
    pub fn validate(self) -> Result<NewUser, String> {
        let name = required(self.name);
        let email = required(self.email).map(|e| e.to_lowercase());
        let password = self.password.filter(|p| !p.is_empty());
        let role = required(self.role);

        let (Some(name), Some(email), Some(password), Some(role)) = (name, email, password, role)
        else {
            return Err("Please provide name, email, password and role".to_string());
        };

        let role = Role::parse(&role)
            .ok_or_else(|| format!("Invalid role '{}': expected owner or tenant", role))?;

        if !email.contains('@') {
            return Err("Please provide a valid email address".to_string());
        }

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ));
        }

        Ok(NewUser {
            name,
            email,
            password,
            role,
            phone: required(self.phone),
            location: required(self.location),
        })
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile update body. Only location and password are mutable.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub location: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}

/// Token response for register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub expires_in: usize, // seconds until expiration
    pub user: UserResponse,
}

/// Current user response
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserResponse,
}

/// User response (sanitized)
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            phone: user.phone.clone(),
            location: user.location.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
