/// Refresh token model
///
/// Only the SHA-256 hash of the opaque token is persisted; the token string
/// itself is returned to the client once and cannot be reconstructed.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Usable at most until first rotation or explicit revocation
    pub fn is_usable(&self) -> bool {
        !self.is_revoked && !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(is_revoked: bool, expires_in: Duration) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "hash".to_string(),
            issued_at: now,
            expires_at: now + expires_in,
            is_revoked,
            revoked_at: None,
            ip_address: None,
            user_agent: None,
        }
    }

    #[test]
    fn test_fresh_token_is_usable() {
        assert!(token(false, Duration::days(7)).is_usable());
    }

    #[test]
    fn test_revoked_token_is_not_usable() {
        assert!(!token(true, Duration::days(7)).is_usable());
    }

    #[test]
    fn test_expired_token_is_not_usable() {
        assert!(!token(false, Duration::seconds(-1)).is_usable());
    }
}
