//! JWT Token Handler
//! Mission: Issue and verify signed, time-bounded identity tokens

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// Default token lifetime: one week
pub const DEFAULT_TTL_HOURS: i64 = 168;

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Token lifetime in seconds
    pub fn expires_in(&self) -> usize {
        self.ttl.num_seconds().max(0) as usize
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user: &User) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.ttl)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: user.id.to_string(),
            iat: now.timestamp() as usize,
            exp: expiration.timestamp() as usize,
        };

        debug!(
            user_id = %user.id,
            ttl_secs = self.ttl.num_seconds(),
            "Generating JWT"
        );

        let token = self.sign(&claims)?;
        Ok((token, self.expires_in()))
    }

    /// Sign an arbitrary claims set with this handler's secret
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .context("Failed to generate JWT")
    }

    /// Validate a JWT token and extract claims.
    ///
    /// Fails on a bad signature, a malformed token, or an expiry in the
    /// past. No leeway is granted on `exp`.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let decoded = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Invalid or expired token")?;

        debug!(user_id = %decoded.claims.sub, "Validated JWT");

        Ok(decoded.claims)
    }
}
