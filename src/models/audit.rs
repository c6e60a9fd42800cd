/// Audit event value object
///
/// Immutable, write-once payload handed to the audit sink. The engine only
/// fills it in and fires it; storage and querying belong to the sink side.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    LoginSucceeded,
    LoginFailed,
    AccountLocked,
    Logout,
    TokenRefreshed,
    PasswordChanged,
    MfaEnabled,
    MfaDisabled,
    MfaVerifySucceeded,
    MfaVerifyFailed,
    SessionCreated,
    SessionTerminated,
    SessionExpired,
    UserCreated,
}

impl AuditEventKind {
    /// Event routing key, one per kind
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::LoginSucceeded => "auth.user.login",
            AuditEventKind::LoginFailed => "auth.user.login.failed",
            AuditEventKind::AccountLocked => "auth.user.locked",
            AuditEventKind::Logout => "auth.user.logout",
            AuditEventKind::TokenRefreshed => "auth.token.refresh",
            AuditEventKind::PasswordChanged => "auth.password.changed",
            AuditEventKind::MfaEnabled => "auth.mfa.enabled",
            AuditEventKind::MfaDisabled => "auth.mfa.disabled",
            AuditEventKind::MfaVerifySucceeded => "auth.mfa.verify.success",
            AuditEventKind::MfaVerifyFailed => "auth.mfa.verify.failed",
            AuditEventKind::SessionCreated => "auth.session.created",
            AuditEventKind::SessionTerminated => "auth.session.terminated",
            AuditEventKind::SessionExpired => "auth.session.expired",
            AuditEventKind::UserCreated => "auth.user.created",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub success: bool,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Set when an MFA check was satisfied by a backup code instead of TOTP
    pub via_backup_code: bool,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, success: bool) -> Self {
        Self {
            kind,
            user_id: None,
            username: None,
            success,
            reason: None,
            ip_address: None,
            user_agent: None,
            via_backup_code: false,
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid, username: &str) -> Self {
        self.user_id = Some(user_id);
        self.username = Some(username.to_string());
        self
    }

    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_client(mut self, ip: Option<&str>, user_agent: Option<&str>) -> Self {
        self.ip_address = ip.map(str::to_string);
        self.user_agent = user_agent.map(str::to_string);
        self
    }

    pub fn via_backup_code(mut self) -> Self {
        self.via_backup_code = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_keys_are_unique() {
        let kinds = [
            AuditEventKind::LoginSucceeded,
            AuditEventKind::LoginFailed,
            AuditEventKind::AccountLocked,
            AuditEventKind::Logout,
            AuditEventKind::TokenRefreshed,
            AuditEventKind::PasswordChanged,
            AuditEventKind::MfaEnabled,
            AuditEventKind::MfaDisabled,
            AuditEventKind::MfaVerifySucceeded,
            AuditEventKind::MfaVerifyFailed,
            AuditEventKind::SessionCreated,
            AuditEventKind::SessionTerminated,
            AuditEventKind::SessionExpired,
            AuditEventKind::UserCreated,
        ];
        let mut keys: Vec<_> = kinds.iter().map(|k| k.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), kinds.len());
    }

    #[test]
    fn test_builder_fills_metadata() {
        let user_id = Uuid::new_v4();
        let event = AuditEvent::new(AuditEventKind::MfaVerifySucceeded, true)
            .with_user(user_id, "alice")
            .with_client(Some("10.0.0.1"), Some("cli/1.0"))
            .via_backup_code();
        assert_eq!(event.user_id, Some(user_id));
        assert_eq!(event.username.as_deref(), Some("alice"));
        assert_eq!(event.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(event.via_backup_code);
    }
}
