/// Session database operations
use crate::error::Result;
use crate::models::session::{Session, REASON_MAX_SESSIONS_EXCEEDED, REASON_SESSION_EXPIRED};
use sqlx::PgPool;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "id, user_id, session_token, ip_address, user_agent, device_type, \
     is_active, last_activity, expires_at, terminated_reason, created_at, updated_at";

/// Create a session, enforcing the per-principal concurrency cap.
///
/// Concurrent logins for the same principal serialize on the user row:
/// locking only the live session rows would admit a phantom (two racing
/// transactions each count below the cap, neither sees the other's insert,
/// both commit). With the user row locked, the second transaction counts
/// after the first commits. When the cap is reached the oldest-by-creation
/// sessions are terminated before the insert; the evicted sessions are
/// returned alongside the new one for auditing.
pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    session_token: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    device_type: Option<&str>,
    max_sessions: i64,
    inactivity_timeout_secs: i64,
) -> Result<(Session, Vec<Session>)> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let active = sqlx::query_as::<_, Session>(&format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM user_sessions
        WHERE user_id = $1 AND is_active = true AND expires_at > NOW()
        ORDER BY created_at ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut evicted = Vec::new();
    if active.len() as i64 >= max_sessions {
        // Evict exactly enough oldest sessions to make room for one more
        let excess = active.len() as i64 - max_sessions + 1;
        for session in active.iter().take(excess as usize) {
            sqlx::query(
                r#"
                UPDATE user_sessions
                SET is_active = false, terminated_reason = $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(session.id)
            .bind(REASON_MAX_SESSIONS_EXCEEDED)
            .execute(&mut *tx)
            .await?;
            evicted.push(session.clone());
        }
    }

    let session = sqlx::query_as::<_, Session>(&format!(
        r#"
        INSERT INTO user_sessions (
            id, user_id, session_token, ip_address, user_agent, device_type,
            is_active, last_activity, expires_at, created_at, updated_at
        )
        VALUES (
            $1, $2, $3, $4, $5, $6,
            true, NOW(), NOW() + ($7 || ' seconds')::interval, NOW(), NOW()
        )
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(session_token)
    .bind(ip_address)
    .bind(user_agent)
    .bind(device_type)
    .bind(inactivity_timeout_secs.to_string())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((session, evicted))
}

pub async fn find_by_id(pool: &PgPool, session_id: Uuid) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "SELECT {SESSION_COLUMNS} FROM user_sessions WHERE id = $1"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// List the principal's active, unexpired sessions, oldest first
pub async fn list_active(pool: &PgPool, user_id: Uuid) -> Result<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(&format!(
        r#"
        SELECT {SESSION_COLUMNS}
        FROM user_sessions
        WHERE user_id = $1 AND is_active = true AND expires_at > NOW()
        ORDER BY created_at ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

/// Sliding-expiry heartbeat. The UPDATE is gated on the row still being
/// active and unexpired, so a dead session is never resurrected. Returns
/// whether anything was extended.
pub async fn heartbeat(
    pool: &PgPool,
    session_id: Uuid,
    inactivity_timeout_secs: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE user_sessions
        SET last_activity = NOW(),
            expires_at = NOW() + ($2 || ' seconds')::interval,
            updated_at = NOW()
        WHERE id = $1 AND is_active = true AND expires_at > NOW()
        "#,
    )
    .bind(session_id)
    .bind(inactivity_timeout_secs.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Idempotent terminate: a second call on the same session hits zero rows
pub async fn terminate(pool: &PgPool, session_id: Uuid, reason: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE user_sessions
        SET is_active = false, terminated_reason = $2, updated_at = NOW()
        WHERE id = $1 AND is_active = true
        "#,
    )
    .bind(session_id)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn terminate_all_for_user(pool: &PgPool, user_id: Uuid, reason: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE user_sessions
        SET is_active = false, terminated_reason = $2, updated_at = NOW()
        WHERE user_id = $1 AND is_active = true
        "#,
    )
    .bind(user_id)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Terminate every active session past its sliding expiry. Safe to run
/// concurrently with live traffic: the WHERE clause makes each row a
/// single idempotent transition.
pub async fn sweep_expired(pool: &PgPool) -> Result<Vec<Session>> {
    let swept = sqlx::query_as::<_, Session>(&format!(
        r#"
        UPDATE user_sessions
        SET is_active = false, terminated_reason = $1, updated_at = NOW()
        WHERE is_active = true AND expires_at <= NOW()
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(REASON_SESSION_EXPIRED)
    .fetch_all(pool)
    .await?;

    Ok(swept)
}
