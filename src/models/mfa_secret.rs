/// MFA secret model
///
/// One row per principal. Created unverified at enrollment; `is_verified`
/// flips exactly once, on the first successful code check. Backup codes are
/// stored as SHA-256 hashes and shrink monotonically as they are consumed.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Only TOTP is implemented; SMS/EMAIL exist as tags for forward compatibility.
pub const MFA_TYPE_TOTP: &str = "TOTP";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MfaSecret {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub secret: String,
    pub mfa_type: String,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub backup_codes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MfaSecret {
    pub fn backup_codes_remaining(&self) -> usize {
        self.backup_codes.len()
    }
}
