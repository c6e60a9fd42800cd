/// MFA secret database operations
use crate::error::Result;
use crate::models::mfa_secret::{MfaSecret, MFA_TYPE_TOTP};
use sqlx::PgPool;
use uuid::Uuid;

const SECRET_COLUMNS: &str =
    "id, user_id, secret, mfa_type, is_verified, verified_at, backup_codes, created_at, updated_at";

/// Store a freshly enrolled, unverified secret. Re-enrollment before the
/// first verification overwrites the pending secret and its backup codes.
pub async fn upsert_unverified(
    pool: &PgPool,
    user_id: Uuid,
    secret: &str,
    backup_code_hashes: &[String],
) -> Result<MfaSecret> {
    let row = sqlx::query_as::<_, MfaSecret>(&format!(
        r#"
        INSERT INTO mfa_secrets (
            id, user_id, secret, mfa_type, is_verified, backup_codes,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, false, $5, NOW(), NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET secret = EXCLUDED.secret,
            is_verified = false,
            verified_at = NULL,
            backup_codes = EXCLUDED.backup_codes,
            updated_at = NOW()
        RETURNING {SECRET_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(secret)
    .bind(MFA_TYPE_TOTP)
    .bind(backup_code_hashes)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<MfaSecret>> {
    let row = sqlx::query_as::<_, MfaSecret>(&format!(
        "SELECT {SECRET_COLUMNS} FROM mfa_secrets WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Flip the secret to verified and the principal to MFA-enabled in one
/// transaction. The conditional UPDATE makes the flip exactly-once: a second
/// activation attempt hits zero rows and returns false.
pub async fn activate(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE mfa_secrets
        SET is_verified = true, verified_at = NOW(), updated_at = NOW()
        WHERE user_id = $1 AND is_verified = false
        "#,
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("UPDATE users SET mfa_enabled = true, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Atomic check-and-consume of a backup code hash. The WHERE clause makes a
/// concurrent retry with the same code lose: only one UPDATE can see the
/// hash still in the array.
pub async fn consume_backup_code(pool: &PgPool, user_id: Uuid, code_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE mfa_secrets
        SET backup_codes = array_remove(backup_codes, $2), updated_at = NOW()
        WHERE user_id = $1 AND is_verified = true AND $2 = ANY(backup_codes)
        "#,
    )
    .bind(user_id)
    .bind(code_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the backup-code set wholesale (regeneration)
pub async fn replace_backup_codes(
    pool: &PgPool,
    user_id: Uuid,
    backup_code_hashes: &[String],
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE mfa_secrets
        SET backup_codes = $2, updated_at = NOW()
        WHERE user_id = $1 AND is_verified = true
        "#,
    )
    .bind(user_id)
    .bind(backup_code_hashes)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Destroy the secret and flip the principal back to MFA-disabled
pub async fn delete_for_user(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM mfa_secrets WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE users SET mfa_enabled = false, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
