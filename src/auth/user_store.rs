//! User Storage
//! Mission: Persist accounts and verify credentials

use crate::auth::models::{NewUser, Role, User};
use crate::db::SharedConnection;
use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{ffi, params, OptionalExtension, Row};
use tracing::{info, warn};
use uuid::Uuid;

/// Cheapest work factor bcrypt accepts; used by tests and as the lower
/// bound of `BCRYPT_COST`
pub const MIN_BCRYPT_COST: u32 = 4;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, location, created_at";

/// User storage with SQLite backend
pub struct UserStore {
    conn: SharedConnection,
    bcrypt_cost: u32,
}

impl UserStore {
    pub fn with_cost(conn: SharedConnection, bcrypt_cost: u32) -> Self {
        Self { conn, bcrypt_cost }
    }

    /// Get user by ID
    pub fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id.to_string()],
            user_from_row,
        )
        .optional()
        .context("Failed to look up user by id")
    }

    /// Get user by email (case-insensitive: emails are stored lowercased)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            user_from_row,
        )
        .optional()
        .context("Failed to look up user by email")
    }

    /// Verify email and password, returning the account on success
    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.get_user_by_email(email)? else {
            return Ok(None);
        };

        let valid = verify(password, &user.password_hash).context("Failed to verify password")?;
        Ok(valid.then_some(user))
    }

    /// Create a new user. Returns `None` when the email is already registered,
    /// including when a concurrent registration wins the race to insert it.
    pub fn create_user(&self, new_user: NewUser) -> Result<Option<User>> {
        if self.get_user_by_email(&new_user.email)?.is_some() {
            return Ok(None);
        }

        let password_hash =
            hash(&new_user.password, self.bcrypt_cost).context("Failed to hash password")?;

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email.trim().to_lowercase(),
            password_hash,
            role: new_user.role,
            phone: new_user.phone,
            location: new_user.location,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, phone, location, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.phone,
                user.location,
                user.created_at,
            ],
        );

        match inserted {
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                warn!(email = %user.email, "Email registered concurrently");
                return Ok(None);
            }
            other => {
                other.context("Failed to insert user")?;
            }
        }

        info!(user_id = %user.id, role = %user.role, "Created user");

        Ok(Some(user))
    }

    /// Change the location of an account
    pub fn update_location(&self, id: &Uuid, location: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET location = ?1 WHERE id = ?2",
            params![location, id.to_string()],
        )
        .context("Failed to update location")?;
        Ok(())
    }

    /// Replace the password of an account
    pub fn update_password(&self, id: &Uuid, password: &str) -> Result<()> {
        let password_hash = hash(password, self.bcrypt_cost).context("Failed to hash password")?;

        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id.to_string()],
        )
        .context("Failed to update password")?;

        info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// Delete an account. Not reachable over HTTP; used by maintenance code
    /// and to exercise stale-token handling.
    pub fn delete_user(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete user")?;
        Ok(rows_affected > 0)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(4)?;
    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::parse(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown role '{}'", role).into(),
            )
        })?,
        phone: row.get(5)?,
        location: row.get(6)?,
        created_at: row.get(7)?,
    })
}
