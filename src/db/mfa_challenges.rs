/// Redemption ledger for MFA temp tokens
///
/// Each temp token carries a unique `jti`; recording it here on successful
/// challenge completion makes the token single-use. The primary-key insert
/// is the atomic check-and-consume: of two concurrent redemptions exactly
/// one row lands.
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Record a redeemed `jti`. Returns false if it was already consumed.
pub async fn consume_jti(
    pool: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO consumed_mfa_tokens (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Garbage-collect entries whose token has expired anyway; replay past this
/// point is already rejected by the expiry check.
pub async fn delete_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM consumed_mfa_tokens WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
