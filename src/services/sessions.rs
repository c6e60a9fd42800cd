/// Session lifecycle: creation under the concurrency cap, heartbeats,
/// termination and the periodic expiry sweep.
use crate::config::SessionSettings;
use crate::db;
use crate::error::Result;
use crate::models::audit::{AuditEvent, AuditEventKind};
use crate::models::session::{Session, REASON_MAX_SESSIONS_EXCEEDED, REASON_SESSION_EXPIRED};
use crate::security::tokens::generate_opaque_token;
use crate::services::{ClientInfo, SharedAuditSink};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    settings: SessionSettings,
    audit: SharedAuditSink,
}

impl SessionService {
    pub fn new(pool: PgPool, settings: SessionSettings, audit: SharedAuditSink) -> Self {
        Self {
            pool,
            settings,
            audit,
        }
    }

    pub fn sweep_interval_secs(&self) -> u64 {
        self.settings.sweep_interval_secs
    }

    /// Open a session for a freshly authenticated principal. If the account
    /// is at its concurrency cap the oldest sessions are evicted in the same
    /// transaction that admits the new one.
    pub async fn create(&self, user_id: Uuid, client: &ClientInfo) -> Result<Session> {
        let max_sessions = if self.settings.single_session_per_user {
            1
        } else {
            self.settings.max_concurrent_sessions
        };

        let (session, evicted) = db::sessions::create_session(
            &self.pool,
            user_id,
            &generate_opaque_token(),
            client.ip(),
            client.agent(),
            client.device(),
            max_sessions,
            self.settings.inactivity_timeout_secs,
        )
        .await?;

        for old in &evicted {
            info!(user_id = %user_id, session_id = %old.id, "Evicted oldest session over concurrency cap");
            self.audit.record(
                AuditEvent::new(AuditEventKind::SessionTerminated, true)
                    .with_user_id(user_id)
                    .with_reason(
                        old.terminated_reason
                            .as_deref()
                            .unwrap_or(REASON_MAX_SESSIONS_EXCEEDED),
                    ),
            );
        }

        self.audit.record(
            AuditEvent::new(AuditEventKind::SessionCreated, true)
                .with_user_id(user_id)
                .with_client(client.ip(), client.agent()),
        );

        Ok(session)
    }

    /// Push a session's inactivity deadline forward. Returns false if the
    /// session is already terminated or past its deadline; a late heartbeat
    /// never resurrects a session.
    pub async fn heartbeat(&self, session_id: Uuid) -> Result<bool> {
        db::sessions::heartbeat(
            &self.pool,
            session_id,
            self.settings.inactivity_timeout_secs,
        )
        .await
    }

    pub async fn find(&self, session_id: Uuid) -> Result<Option<Session>> {
        db::sessions::find_by_id(&self.pool, session_id).await
    }

    pub async fn list_active(&self, user_id: Uuid) -> Result<Vec<Session>> {
        db::sessions::list_active(&self.pool, user_id).await
    }

    /// Terminate one session. Idempotent: terminating a dead session is a
    /// successful no-op that returns false.
    pub async fn terminate(&self, session_id: Uuid, reason: &str) -> Result<bool> {
        let terminated = db::sessions::terminate(&self.pool, session_id, reason).await?;
        if terminated {
            self.audit.record(
                AuditEvent::new(AuditEventKind::SessionTerminated, true).with_reason(reason),
            );
        }
        Ok(terminated)
    }

    pub async fn terminate_all(&self, user_id: Uuid, reason: &str) -> Result<u64> {
        let count = db::sessions::terminate_all_for_user(&self.pool, user_id, reason).await?;
        if count > 0 {
            info!(user_id = %user_id, count, reason, "Terminated all active sessions");
            self.audit.record(
                AuditEvent::new(AuditEventKind::SessionTerminated, true)
                    .with_user_id(user_id)
                    .with_reason(reason),
            );
        }
        Ok(count)
    }

    /// One sweep pass: mark every session past its inactivity deadline as
    /// expired and emit an audit event per victim.
    pub async fn sweep_once(&self) -> Result<u64> {
        let swept = db::sessions::sweep_expired(&self.pool).await?;
        for session in &swept {
            self.audit.record(
                AuditEvent::new(AuditEventKind::SessionExpired, true)
                    .with_user_id(session.user_id)
                    .with_reason(REASON_SESSION_EXPIRED),
            );
        }

        let expired_tokens = db::refresh_tokens::delete_expired(&self.pool).await?;
        let expired_challenges = db::mfa_challenges::delete_expired(&self.pool).await?;
        debug!(
            sessions = swept.len(),
            refresh_tokens = expired_tokens,
            mfa_challenges = expired_challenges,
            "Expiry sweep complete"
        );

        Ok(swept.len() as u64)
    }
}
