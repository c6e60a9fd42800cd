/// Service layer: authentication flows composed from the db and security
/// primitives. Each service is a cheap-to-clone handle over the shared pool.
pub mod audit;
pub mod auth;
pub mod mfa;
pub mod sessions;
pub mod sweeper;
pub mod tokens;

pub use audit::{AuditSink, KafkaAuditSink, LogAuditSink, SharedAuditSink};
pub use auth::{AuthService, LoginOutcome, LoginSuccess};
pub use mfa::{MfaEnrollment, MfaService};
pub use sessions::SessionService;
pub use tokens::{TokenPair, TokenService};

/// Request-scoped client metadata attached to sessions, tokens and audit
/// events. All fields are best-effort.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<String>,
}

impl ClientInfo {
    pub fn ip(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn device(&self) -> Option<&str> {
        self.device_type.as_deref()
    }
}
