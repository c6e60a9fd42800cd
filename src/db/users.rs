/// User (credential store) database operations
use crate::error::Result;
use crate::models::User;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, roles, is_active, mfa_enabled, \
     failed_login_attempts, locked_until, last_login, password_changed_at, created_at, updated_at";

/// Find a principal by username or email (single lookup so the caller cannot
/// tell which one matched)
pub async fn find_by_username_or_email(pool: &PgPool, identifier: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1"
    ))
    .bind(identifier)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool> {
    let exists: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(pool)
            .await?;
    Ok(exists.0)
}

pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(exists.0)
}

/// Create an active, MFA-disabled principal with zeroed lockout state
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    roles: &[String],
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (
            id, username, email, password_hash, roles,
            is_active, mfa_enabled, failed_login_attempts,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, true, false, 0, NOW(), NOW())
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(roles)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Record a failed login attempt, locking the account when the incremented
/// counter reaches the threshold. One atomic UPDATE so concurrent failures
/// never lose an increment; the row is durably updated before the caller
/// surfaces the error.
pub async fn record_failed_login(
    pool: &PgPool,
    user_id: Uuid,
    max_attempts: i32,
    lock_duration_secs: i64,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET failed_login_attempts = failed_login_attempts + 1,
            locked_until = CASE
                WHEN $2 > 0 AND failed_login_attempts + 1 >= $2
                THEN NOW() + ($3 || ' seconds')::interval
                ELSE locked_until
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(max_attempts)
    .bind(lock_duration_secs.to_string())
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Reset the failure counter and lock window after a successful password
/// check, and stamp the login time
pub async fn record_successful_login(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET failed_login_attempts = 0,
            locked_until = NULL,
            last_login = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_password(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2,
            password_changed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_mfa_enabled(pool: &PgPool, user_id: Uuid, enabled: bool) -> Result<()> {
    sqlx::query("UPDATE users SET mfa_enabled = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(enabled)
        .execute(pool)
        .await?;

    Ok(())
}
