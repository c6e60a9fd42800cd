/// Authentication Service Library
///
/// Credential verification under a lockout policy, JWT access tokens with
/// rotating opaque refresh tokens, TOTP second factor with one-shot backup
/// codes, and bounded concurrent sessions with a background expiry sweep.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: Database operations (users, tokens, sessions, MFA secrets)
/// - `error`: Error types
/// - `models`: Data models
/// - `security`: JWT, password hashing, TOTP, opaque tokens
/// - `services`: Business logic (login, tokens, sessions, MFA, audit)
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod security;
pub mod services;

// Re-export commonly used types
pub use error::{AuthError, Result};
pub use services::{AuthService, ClientInfo, LoginOutcome, MfaService, SessionService, TokenService};
