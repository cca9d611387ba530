use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};

pub mod csrf;
pub mod password_policy;
pub mod reset_tokens;
pub mod session;

use session::{Session, SessionStore};
pub use csrf::CsrfService;
pub use password_policy::PasswordPolicy;
pub use reset_tokens::ResetTokenStore;

pub const SESSION_COOKIE: &str = "session";

pub struct AuthService {
    session_store: SessionStore,
    session_duration_hours: i64,
    secure_cookies: bool,
}

impl AuthService {
    pub fn new(pool: SqlitePool, session_duration_hours: i64, secure_cookies: bool) -> Self {
        Self {
            session_store: SessionStore::new(pool),
            session_duration_hours,
            secure_cookies,
        }
    }

    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    pub async fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Burns roughly the time of a real verification, for unknown users.
    pub async fn verify_dummy_password(password: &str) {
        let _ = Self::hash_password(password).await;
    }

    pub async fn create_session(&self, member_id: Uuid) -> Result<(Session, String)> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(self.session_duration_hours);

        let session = self.session_store
            .create(member_id, &token, expires_at)
            .await?;

        Ok((session, token))
    }

    pub async fn validate_session(&self, token: &str) -> Result<Option<Session>> {
        self.session_store.find_by_token(token).await
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<()> {
        self.session_store.delete_by_token(token).await
    }

    pub async fn invalidate_member_sessions(&self, member_id: Uuid) -> Result<()> {
        self.session_store.delete_by_member(member_id).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.session_store.cleanup_expired().await
    }

    pub fn create_session_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(self.secure_cookies)
            .max_age(cookie::time::Duration::hours(self.session_duration_hours))
            .build()
    }

    pub fn create_logout_cookie() -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(cookie::time::Duration::seconds(0))
            .build()
    }
}

pub(crate) fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn hash_token(token: &str) -> String {
    use sha2::{Sha256, Digest};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_hash_round_trip() {
        let hash = AuthService::hash_password("correct horse battery").await.unwrap();
        assert!(AuthService::verify_password("correct horse battery", &hash).await.unwrap());
        assert!(!AuthService::verify_password("wrong horse", &hash).await.unwrap());
    }

    #[test]
    fn test_token_generation() {
        let token = generate_token();
        assert_eq!(token.len(), 64); // 32 bytes = 64 hex chars
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("test_token");
        let hash2 = hash_token("test_token");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, "test_token");
    }
}
