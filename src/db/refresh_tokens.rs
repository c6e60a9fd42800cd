/// Refresh token database operations
///
/// Rows are keyed by the SHA-256 hash of the opaque token. Rotation is the
/// only path that both revokes and issues, and it runs in one transaction so
/// a replayed token can never win a race against its own rotation.
use crate::error::{AuthError, Result};
use crate::models::RefreshToken;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const TOKEN_COLUMNS: &str = "id, user_id, token_hash, issued_at, expires_at, is_revoked, \
     revoked_at, ip_address, user_agent";

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<RefreshToken> {
    let token = sqlx::query_as::<_, RefreshToken>(&format!(
        r#"
        INSERT INTO refresh_tokens (
            id, user_id, token_hash, issued_at, expires_at,
            is_revoked, ip_address, user_agent
        )
        VALUES ($1, $2, $3, NOW(), $4, false, $5, $6)
        RETURNING {TOKEN_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(ip_address)
    .bind(user_agent)
    .fetch_one(pool)
    .await?;

    Ok(token)
}

pub async fn find_by_hash(pool: &PgPool, token_hash: &str) -> Result<Option<RefreshToken>> {
    let token = sqlx::query_as::<_, RefreshToken>(&format!(
        "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(token)
}

/// Atomically revoke the old token and insert its replacement.
///
/// The conditional UPDATE only hits a row that is still unrevoked; zero rows
/// means the token was unknown or already rotated, so a captured-and-replayed
/// token always fails here. An expired row aborts the transaction.
pub async fn rotate(
    pool: &PgPool,
    old_token_hash: &str,
    new_token_hash: &str,
    expires_at: DateTime<Utc>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<RefreshToken> {
    let mut tx = pool.begin().await?;

    let old = sqlx::query_as::<_, RefreshToken>(&format!(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = true, revoked_at = NOW()
        WHERE token_hash = $1 AND is_revoked = false
        RETURNING {TOKEN_COLUMNS}
        "#
    ))
    .bind(old_token_hash)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AuthError::TokenInvalid)?;

    if old.is_expired() {
        // Dropping the transaction rolls the revocation back; the row stays
        // untouched and unusable either way.
        return Err(AuthError::TokenExpired);
    }

    let new = sqlx::query_as::<_, RefreshToken>(&format!(
        r#"
        INSERT INTO refresh_tokens (
            id, user_id, token_hash, issued_at, expires_at,
            is_revoked, ip_address, user_agent
        )
        VALUES ($1, $2, $3, NOW(), $4, false, $5, $6)
        RETURNING {TOKEN_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(old.user_id)
    .bind(new_token_hash)
    .bind(expires_at)
    .bind(ip_address)
    .bind(user_agent)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(new)
}

/// Revoke a single token by its hash. Idempotent: revoking an already
/// revoked or unknown token affects zero rows and returns false.
pub async fn revoke_by_hash(pool: &PgPool, token_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = true, revoked_at = NOW()
        WHERE token_hash = $1 AND is_revoked = false
        "#,
    )
    .bind(token_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Revoke every outstanding refresh token for a principal
pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = true, revoked_at = NOW()
        WHERE user_id = $1 AND is_revoked = false
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Garbage-collect rows whose natural expiry has passed
pub async fn delete_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
