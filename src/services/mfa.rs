/// TOTP multi-factor enrollment, verification and backup codes
///
/// Enrollment is two-phase: `enroll` stores an unverified secret (and shows
/// it to the user exactly once), `activate` turns MFA on only after the user
/// proves they can produce a valid code from it. Backup codes are stored
/// hashed and each one is consumable exactly once.
use crate::config::MfaSettings;
use crate::db;
use crate::error::{AuthError, Result};
use crate::models::audit::{AuditEvent, AuditEventKind};
use crate::models::session::REASON_MFA_DISABLED;
use crate::models::user::User;
use crate::security::tokens::{generate_backup_code, hash_token, BACKUP_CODE_LENGTH};
use crate::security::totp;
use crate::services::SharedAuditSink;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

/// Enrollment material returned to the user once, never again
#[derive(Debug, Clone, Serialize)]
pub struct MfaEnrollment {
    pub secret_base32: String,
    pub provisioning_uri: String,
    pub backup_codes: Vec<String>,
}

/// Result of a second-factor check during login
#[derive(Debug, Clone, Copy)]
pub struct MfaVerification {
    pub via_backup_code: bool,
}

#[derive(Clone)]
pub struct MfaService {
    pool: PgPool,
    settings: MfaSettings,
    audit: SharedAuditSink,
}

impl MfaService {
    pub fn new(pool: PgPool, settings: MfaSettings, audit: SharedAuditSink) -> Self {
        Self {
            pool,
            settings,
            audit,
        }
    }

    /// Generate a pending secret and backup codes. Re-enrolling before
    /// activation replaces the pending secret; re-enrolling after activation
    /// is rejected.
    pub async fn enroll(&self, user: &User) -> Result<MfaEnrollment> {
        if user.mfa_enabled {
            return Err(AuthError::MfaAlreadyEnabled);
        }

        let secret = totp::generate_secret();
        let secret_base32 = totp::encode_secret(&secret);
        let (codes, hashes) = self.generate_backup_codes();

        db::mfa_secrets::upsert_unverified(&self.pool, user.id, &secret_base32, &hashes).await?;

        info!(user_id = %user.id, "Stored pending TOTP secret");

        Ok(MfaEnrollment {
            provisioning_uri: totp::provisioning_uri(
                &self.settings.issuer,
                &user.username,
                &secret_base32,
            ),
            secret_base32,
            backup_codes: codes,
        })
    }

    /// First successful verification of the pending secret enables MFA
    pub async fn activate(&self, user: &User, code: &str) -> Result<()> {
        let record = db::mfa_secrets::find_by_user(&self.pool, user.id)
            .await?
            .ok_or(AuthError::MfaNotEnabled)?;
        if record.is_verified {
            return Err(AuthError::MfaAlreadyEnabled);
        }

        let secret = totp::decode_secret(&record.secret)?;
        if !totp::verify(&secret, code)? {
            self.audit.record(
                AuditEvent::new(AuditEventKind::MfaVerifyFailed, false)
                    .with_user(user.id, &user.username)
                    .with_reason("activation code rejected"),
            );
            return Err(AuthError::InvalidMfaCode);
        }

        if !db::mfa_secrets::activate(&self.pool, user.id).await? {
            // Lost a race with a concurrent activation of the same secret.
            return Err(AuthError::MfaAlreadyEnabled);
        }

        self.audit.record(
            AuditEvent::new(AuditEventKind::MfaEnabled, true).with_user(user.id, &user.username),
        );
        Ok(())
    }

    /// Check a second factor during login: TOTP first, then a one-shot
    /// backup code. Backup codes are consumed atomically, so a replay of the
    /// same code fails even under concurrency.
    pub async fn verify_login_code(&self, user: &User, code: &str) -> Result<MfaVerification> {
        let record = db::mfa_secrets::find_by_user(&self.pool, user.id)
            .await?
            .filter(|r| r.is_verified)
            .ok_or(AuthError::MfaNotEnabled)?;

        let secret = totp::decode_secret(&record.secret)?;
        if totp::verify(&secret, code)? {
            self.audit.record(
                AuditEvent::new(AuditEventKind::MfaVerifySucceeded, true)
                    .with_user(user.id, &user.username),
            );
            return Ok(MfaVerification {
                via_backup_code: false,
            });
        }

        let normalized = normalize_backup_code(code);
        if normalized.len() == BACKUP_CODE_LENGTH
            && db::mfa_secrets::consume_backup_code(&self.pool, user.id, &hash_token(&normalized))
                .await?
        {
            warn!(user_id = %user.id, "Backup code consumed for second factor");
            self.audit.record(
                AuditEvent::new(AuditEventKind::MfaVerifySucceeded, true)
                    .with_user(user.id, &user.username)
                    .via_backup_code(),
            );
            return Ok(MfaVerification {
                via_backup_code: true,
            });
        }

        self.audit.record(
            AuditEvent::new(AuditEventKind::MfaVerifyFailed, false)
                .with_user(user.id, &user.username),
        );
        Err(AuthError::InvalidMfaCode)
    }

    /// Turn MFA off. Requires a currently valid code, then destroys the
    /// secret, revokes refresh tokens and terminates sessions so stolen
    /// credentials cannot ride out the downgrade.
    pub async fn disable(&self, user: &User, code: &str) -> Result<()> {
        self.verify_login_code(user, code).await?;

        db::mfa_secrets::delete_for_user(&self.pool, user.id).await?;
        db::refresh_tokens::revoke_all_for_user(&self.pool, user.id).await?;
        db::sessions::terminate_all_for_user(&self.pool, user.id, REASON_MFA_DISABLED).await?;

        info!(user_id = %user.id, "MFA disabled");
        self.audit.record(
            AuditEvent::new(AuditEventKind::MfaDisabled, true).with_user(user.id, &user.username),
        );
        Ok(())
    }

    /// Replace all remaining backup codes with a fresh set. Requires a
    /// currently valid TOTP code.
    pub async fn regenerate_backup_codes(&self, user: &User, code: &str) -> Result<Vec<String>> {
        let record = db::mfa_secrets::find_by_user(&self.pool, user.id)
            .await?
            .filter(|r| r.is_verified)
            .ok_or(AuthError::MfaNotEnabled)?;

        let secret = totp::decode_secret(&record.secret)?;
        if !totp::verify(&secret, code)? {
            return Err(AuthError::InvalidMfaCode);
        }

        let (codes, hashes) = self.generate_backup_codes();
        if !db::mfa_secrets::replace_backup_codes(&self.pool, user.id, &hashes).await? {
            return Err(AuthError::MfaNotEnabled);
        }

        Ok(codes)
    }

    fn generate_backup_codes(&self) -> (Vec<String>, Vec<String>) {
        let codes: Vec<String> = (0..self.settings.backup_code_count)
            .map(|_| generate_backup_code())
            .collect();
        let hashes = codes.iter().map(|c| hash_token(c)).collect();
        (codes, hashes)
    }
}

/// Backup codes are compared case-insensitively and ignore surrounding
/// whitespace; users retype them from paper.
fn normalize_backup_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
