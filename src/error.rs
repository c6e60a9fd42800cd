use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad username/password or unknown principal. Deliberately a single
    /// variant so callers cannot enumerate accounts.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked until {0}")]
    AccountLocked(DateTime<Utc>),

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Invalid MFA code")]
    InvalidMfaCode,

    #[error("MFA not enabled")]
    MfaNotEnabled,

    #[error("MFA already enabled")]
    MfaAlreadyEnabled,

    #[error("Token expired")]
    TokenExpired,

    /// Bad signature, malformed, wrong purpose, or revoked. The distinction
    /// is logged at the point of detection but collapsed for the caller.
    #[error("Invalid token")]
    TokenInvalid,

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Session not found")]
    SessionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            kind => {
                // Signature/format/issuer failures all collapse to one
                // user-facing kind; keep the detail in the logs.
                tracing::debug!("JWT validation failed: {:?}", kind);
                AuthError::TokenInvalid
            }
        }
    }
}
