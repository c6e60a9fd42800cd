/// Database repositories
///
/// Free functions over `&PgPool`, one module per table. Read-modify-write
/// sequences that can race (failed-attempt counters, rotation, the session
/// cap) are single conditional UPDATEs or short transactions with row locks.
pub mod mfa_challenges;
pub mod mfa_secrets;
pub mod refresh_tokens;
pub mod sessions;
pub mod users;
