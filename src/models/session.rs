/// User session model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Termination reason recorded when a session goes inactive
pub const REASON_MAX_SESSIONS_EXCEEDED: &str = "MAX_SESSIONS_EXCEEDED";
pub const REASON_SESSION_EXPIRED: &str = "SESSION_EXPIRED";
pub const REASON_USER_LOGOUT: &str = "USER_LOGOUT";
pub const REASON_PASSWORD_CHANGED: &str = "PASSWORD_CHANGED";
pub const REASON_MFA_DISABLED: &str = "MFA_DISABLED";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub terminated_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Active and not yet past its sliding expiry
    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    /// Heartbeats only extend sessions that are still alive; a terminated or
    /// expired session is never resurrected.
    pub fn can_heartbeat_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(is_active: bool, expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_token: "token".to_string(),
            ip_address: None,
            user_agent: None,
            device_type: None,
            is_active,
            last_activity: now,
            expires_at: now + expires_in,
            terminated_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_live_session_is_valid() {
        assert!(session(true, Duration::minutes(30)).is_valid());
    }

    #[test]
    fn test_terminated_session_is_invalid() {
        assert!(!session(false, Duration::minutes(30)).is_valid());
    }

    #[test]
    fn test_expired_session_cannot_heartbeat() {
        let s = session(true, Duration::seconds(-1));
        assert!(!s.can_heartbeat_at(Utc::now()));
    }

    #[test]
    fn test_terminated_session_cannot_heartbeat() {
        let s = session(false, Duration::minutes(30));
        assert!(!s.can_heartbeat_at(Utc::now()));
    }
}
