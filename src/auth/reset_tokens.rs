use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use super::{generate_token, hash_token};

/// Single-use password reset tokens. As with sessions, only the SHA-256 of
/// the token is kept.
pub struct ResetTokenStore {
    pool: SqlitePool,
    timeout_hours: i64,
}

impl ResetTokenStore {
    pub fn new(pool: SqlitePool, timeout_hours: i64) -> Self {
        Self { pool, timeout_hours }
    }

    pub async fn issue(&self, member_id: Uuid) -> Result<String> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.timeout_hours);

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, member_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(member_id.to_string())
        .bind(hash_token(&token))
        .bind(expires_at.naive_utc())
        .bind(now.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Whether the token is unexpired, unused and belongs to the member.
    pub async fn is_valid(&self, member_id: Uuid, token: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM password_reset_tokens
            WHERE member_id = ? AND token_hash = ? AND used_at IS NULL AND expires_at > ?
            "#
        )
        .bind(member_id.to_string())
        .bind(hash_token(token))
        .bind(Utc::now().naive_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Consumes the token and stores the new password hash in one
    /// transaction. On success the member's other reset tokens and all of
    /// their sessions are gone too. Returns false, with nothing written, when
    /// the token was already used, expired or never issued; concurrent
    /// callers get at most one true.
    pub async fn redeem(&self, member_id: Uuid, token: &str, password_hash: &str) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let member_id = member_id.to_string();
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE password_reset_tokens SET used_at = ?
            WHERE member_id = ? AND token_hash = ? AND used_at IS NULL AND expires_at > ?
            "#
        )
        .bind(now)
        .bind(&member_id)
        .bind(hash_token(token))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() != 1 {
            return Ok(false);
        }

        let updated = sqlx::query("UPDATE members SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now)
            .bind(&member_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() != 1 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM password_reset_tokens WHERE member_id = ?")
            .bind(&member_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE member_id = ?")
            .bind(&member_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

/// Member id as it appears in reset links.
pub fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

pub fn decode_uid(uidb64: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim()).ok()?;
    Uuid::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_encoding_round_trip() {
        let id = Uuid::new_v4();
        let encoded = encode_uid(id);
        assert_eq!(encoded.len(), 22);
        assert!(!encoded.contains('=') && !encoded.contains('/') && !encoded.contains('+'));
        assert_eq!(decode_uid(&encoded), Some(id));
    }

    #[test]
    fn test_bad_uid_is_rejected() {
        assert_eq!(decode_uid("not base64!"), None);
        assert_eq!(decode_uid("AAAA"), None);
        assert_eq!(decode_uid(""), None);
    }
}
