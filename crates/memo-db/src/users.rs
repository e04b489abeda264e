//! Accounts, password verification and opaque bearer tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Tokens are random
//! alphanumeric secrets with a fixed prefix; only their SHA-256 hex digest
//! is persisted.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::unique_violation_as_conflict;
use memo_core::defaults::{ACCESS_TOKEN_PREFIX, ACCESS_TOKEN_SECRET_LEN};
use memo_core::{
    new_v7, Error, IssuedToken, RegisterUserRequest, Result, TokenRepository, User,
    UserRepository, UserScope, UserStatus,
};

const USER_COLUMNS: &str = "id, email, username, status, last_login, created_at, updated_at";

fn user_from_row(row: &PgRow) -> User {
    let status: String = row.get("status");
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        status: status.parse().unwrap_or_default(),
        last_login: row.get("last_login"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Hash a password into an Argon2id PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Internal(format!("Failed to encode salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// PostgreSQL implementation of UserRepository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn register(&self, req: RegisterUserRequest) -> Result<User> {
        req.validate()?;
        let email = req.email.trim().to_lowercase();
        let username = req.username.trim().to_string();
        let password_hash = hash_password(&req.password)?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO app_user (id, email, username, password_hash, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'active', $5, $5)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(new_v7())
        .bind(&email)
        .bind(&username)
        .bind(&password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_violation_as_conflict(e, |constraint| match constraint {
                Some("uq_app_user_username") => "Username already taken".to_string(),
                _ => "Email already registered".to_string(),
            })
        })?;

        let user = user_from_row(&row);
        info!(
            subsystem = "db",
            component = "users",
            op = "register",
            user_id = %user.id,
            "User registered"
        );
        Ok(user)
    }

    async fn verify_credentials(&self, login: &str, password: &str) -> Result<User> {
        let login = login.trim();
        let row = sqlx::query(&format!(
            "SELECT {}, password_hash FROM app_user WHERE email = lower($1) OR username = $1 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Err(Error::Unauthorized("Incorrect email or password".to_string()));
        };
        let stored: String = row.get("password_hash");
        if !verify_password(password, &stored) {
            debug!(subsystem = "db", component = "users", op = "verify", "Password mismatch");
            return Err(Error::Unauthorized("Incorrect email or password".to_string()));
        }

        let user = user_from_row(&row);
        if user.status != UserStatus::Active {
            return Err(Error::InvalidInput("Inactive user".to_string()));
        }

        let now = Utc::now();
        sqlx::query("UPDATE app_user SET last_login = $1 WHERE id = $2")
            .bind(now)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(User {
            last_login: Some(now),
            ..user
        })
    }

    async fn get(&self, scope: UserScope) -> Result<User> {
        let row = sqlx::query(&format!("SELECT {} FROM app_user WHERE id = $1", USER_COLUMNS))
            .bind(scope.user_id())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(|r| user_from_row(&r))
            .ok_or_else(|| Error::NotFound(format!("User {}", scope.user_id())))
    }

    async fn delete(&self, scope: UserScope) -> Result<()> {
        let result = sqlx::query("DELETE FROM app_user WHERE id = $1")
            .bind(scope.user_id())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("User {}", scope.user_id())));
        }
        info!(
            subsystem = "db",
            component = "users",
            op = "delete",
            user_id = %scope.user_id(),
            "User deleted with all owned data"
        );
        Ok(())
    }
}

/// PostgreSQL implementation of TokenRepository.
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: Pool<Postgres>,
}

impl PgTokenRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Generate a random alphanumeric secret.
    fn generate_secret(length: usize) -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Hash a token using SHA256.
    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn issue(&self, user_id: Uuid, lifetime_minutes: i64) -> Result<IssuedToken> {
        if lifetime_minutes < 1 {
            return Err(Error::Config("token lifetime must be at least one minute".to_string()));
        }
        let token = format!(
            "{}{}",
            ACCESS_TOKEN_PREFIX,
            Self::generate_secret(ACCESS_TOKEN_SECRET_LEN)
        );
        let now = Utc::now();
        let expires_at = now + Duration::minutes(lifetime_minutes);

        sqlx::query(
            "INSERT INTO access_token (id, user_id, token_hash, expires_at, revoked, created_at)
             VALUES ($1, $2, $3, $4, false, $5)",
        )
        .bind(new_v7())
        .bind(user_id)
        .bind(Self::hash_token(&token))
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(IssuedToken {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_at,
        })
    }

    async fn validate(&self, token: &str) -> Result<Option<UserScope>> {
        if !token.starts_with(ACCESS_TOKEN_PREFIX) {
            return Ok(None);
        }
        let now = Utc::now();
        let row = sqlx::query(
            "UPDATE access_token t SET last_used_at = $2
             FROM app_user u
             WHERE t.token_hash = $1
               AND t.revoked = false
               AND t.expires_at > $2
               AND u.id = t.user_id
               AND u.status = 'active'
             RETURNING t.user_id",
        )
        .bind(Self::hash_token(token))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| UserScope::new(r.get("user_id"))))
    }

    async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE access_token SET revoked = true WHERE token_hash = $1 AND revoked = false",
        )
        .bind(Self::hash_token(token))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_password_hash_is_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_generate_secret_charset_and_length() {
        let secret = PgTokenRepository::generate_secret(48);
        assert_eq!(secret.len(), 48);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let h1 = PgTokenRepository::hash_token("memo_at_abc");
        let h2 = PgTokenRepository::hash_token("memo_at_abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, PgTokenRepository::hash_token("memo_at_abd"));
    }
}
