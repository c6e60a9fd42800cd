/// User (principal) model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub mfa_enabled: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lockout state of an account, evaluated against a point in time.
///
/// `Locked` resolves back to `Active` purely by wall-clock comparison; no
/// explicit unlock transition is ever persisted. `Disabled` is an orthogonal
/// operator-controlled flag and wins over everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Active,
    Locked(DateTime<Utc>),
    Disabled,
}

impl User {
    /// Evaluate the lockout state machine at `now`
    pub fn account_state_at(&self, now: DateTime<Utc>) -> AccountState {
        if !self.is_active {
            return AccountState::Disabled;
        }
        match self.locked_until {
            Some(until) if until > now => AccountState::Locked(until),
            _ => AccountState::Active,
        }
    }

    pub fn account_state(&self) -> AccountState {
        self.account_state_at(Utc::now())
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.account_state(), AccountState::Locked(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(is_active: bool, locked_until: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            roles: vec!["USER".to_string()],
            is_active,
            mfa_enabled: false,
            failed_login_attempts: 0,
            locked_until,
            last_login: None,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_active_account() {
        assert_eq!(user(true, None).account_state(), AccountState::Active);
    }

    #[test]
    fn test_locked_account_with_future_timestamp() {
        let until = Utc::now() + Duration::minutes(30);
        assert_eq!(
            user(true, Some(until)).account_state(),
            AccountState::Locked(until)
        );
    }

    #[test]
    fn test_lock_auto_resolves_by_wall_clock() {
        // A lock timestamp in the past means the account is active again
        // without any explicit unlock transition.
        let until = Utc::now() - Duration::seconds(1);
        assert_eq!(user(true, Some(until)).account_state(), AccountState::Active);
    }

    #[test]
    fn test_disabled_wins_over_lock() {
        let until = Utc::now() + Duration::minutes(30);
        assert_eq!(
            user(false, Some(until)).account_state(),
            AccountState::Disabled
        );
    }
}
