pub mod audit;
pub mod mfa_secret;
pub mod refresh_token;
pub mod session;
pub mod user;

pub use audit::{AuditEvent, AuditEventKind};
pub use mfa_secret::MfaSecret;
pub use refresh_token::RefreshToken;
pub use session::Session;
pub use user::{AccountState, User};
