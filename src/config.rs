//! Configuration management for the authentication service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! Every knob has a conservative default; only `DATABASE_URL` and
//! `JWT_SECRET` are mandatory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub lockout: LockoutSettings,
    pub session: SessionSettings,
    pub mfa: MfaSettings,
    pub kafka: KafkaSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            lockout: LockoutSettings::from_env()?,
            session: SessionSettings::from_env()?,
            mfa: MfaSettings::from_env()?,
            kafka: KafkaSettings::from_env()?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .context("Invalid DATABASE_MIN_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        })
    }
}

/// JWT signing settings (HMAC-SHA-512)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    /// Access token lifetime in seconds (default 15 minutes)
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime in seconds (default 7 days)
    pub refresh_token_ttl_secs: i64,
    /// MFA temp token lifetime in seconds (default 5 minutes)
    pub mfa_temp_token_ttl_secs: i64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "auth-service".to_string()),
            access_token_ttl_secs: env::var("JWT_ACCESS_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid JWT_ACCESS_TOKEN_TTL_SECS")?,
            refresh_token_ttl_secs: env::var("JWT_REFRESH_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .context("Invalid JWT_REFRESH_TOKEN_TTL_SECS")?,
            mfa_temp_token_ttl_secs: env::var("JWT_MFA_TEMP_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid JWT_MFA_TEMP_TOKEN_TTL_SECS")?,
        })
    }
}

/// Account lockout policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutSettings {
    /// Failed attempts before the account locks (default 5)
    pub max_failed_attempts: i32,
    /// Lock window in seconds (default 30 minutes)
    pub lock_duration_secs: i64,
}

impl LockoutSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            max_failed_attempts: env::var("LOCKOUT_MAX_FAILED_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid LOCKOUT_MAX_FAILED_ATTEMPTS")?,
            lock_duration_secs: env::var("LOCKOUT_DURATION_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .context("Invalid LOCKOUT_DURATION_SECS")?,
        })
    }
}

/// Concurrent-session policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Concurrency cap per principal (default 5)
    pub max_concurrent_sessions: i64,
    /// Sliding inactivity timeout in seconds (default 30 minutes)
    pub inactivity_timeout_secs: i64,
    /// Expiry sweep period in seconds (default hourly)
    pub sweep_interval_secs: u64,
    /// When true, issuing a refresh token revokes the principal's prior ones
    pub single_session_per_user: bool,
}

impl SessionSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            max_concurrent_sessions: env::var("SESSION_MAX_CONCURRENT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid SESSION_MAX_CONCURRENT")?,
            inactivity_timeout_secs: env::var("SESSION_INACTIVITY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .context("Invalid SESSION_INACTIVITY_TIMEOUT_SECS")?,
            sweep_interval_secs: env::var("SESSION_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("Invalid SESSION_SWEEP_INTERVAL_SECS")?,
            single_session_per_user: env::var("SESSION_SINGLE_PER_USER")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid SESSION_SINGLE_PER_USER")?,
        })
    }
}

/// TOTP enrollment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaSettings {
    /// Issuer shown in authenticator apps
    pub issuer: String,
    /// Number of single-use backup codes handed out at enrollment
    pub backup_code_count: usize,
}

impl MfaSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            issuer: env::var("MFA_ISSUER").unwrap_or_else(|_| "auth-service".to_string()),
            backup_code_count: env::var("MFA_BACKUP_CODE_COUNT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid MFA_BACKUP_CODE_COUNT")?,
        })
    }
}

/// Kafka audit sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSettings {
    pub enabled: bool,
    pub brokers: String,
    pub topic: String,
}

impl KafkaSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            enabled: env::var("KAFKA_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid KAFKA_ENABLED")?,
            brokers: env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()),
            topic: env::var("KAFKA_AUDIT_TOPIC").unwrap_or_else(|_| "auth.events".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_optional_vars() {
        for var in [
            "LOCKOUT_MAX_FAILED_ATTEMPTS",
            "LOCKOUT_DURATION_SECS",
            "SESSION_MAX_CONCURRENT",
            "SESSION_INACTIVITY_TIMEOUT_SECS",
            "SESSION_SWEEP_INTERVAL_SECS",
            "SESSION_SINGLE_PER_USER",
            "MFA_ISSUER",
            "MFA_BACKUP_CODE_COUNT",
            "JWT_ISSUER",
            "JWT_ACCESS_TOKEN_TTL_SECS",
            "KAFKA_ENABLED",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_lockout_defaults() {
        clear_optional_vars();
        let lockout = LockoutSettings::from_env().expect("defaults should parse");
        assert_eq!(lockout.max_failed_attempts, 5);
        assert_eq!(lockout.lock_duration_secs, 1800);
    }

    #[test]
    #[serial]
    fn test_session_defaults() {
        clear_optional_vars();
        let session = SessionSettings::from_env().expect("defaults should parse");
        assert_eq!(session.max_concurrent_sessions, 5);
        assert_eq!(session.inactivity_timeout_secs, 1800);
        assert_eq!(session.sweep_interval_secs, 3600);
        assert!(!session.single_session_per_user);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        clear_optional_vars();
        env::set_var("SESSION_MAX_CONCURRENT", "3");
        let session = SessionSettings::from_env().expect("override should parse");
        assert_eq!(session.max_concurrent_sessions, 3);
        env::remove_var("SESSION_MAX_CONCURRENT");
    }

    #[test]
    #[serial]
    fn test_invalid_value_rejected() {
        clear_optional_vars();
        env::set_var("LOCKOUT_MAX_FAILED_ATTEMPTS", "not-a-number");
        assert!(LockoutSettings::from_env().is_err());
        env::remove_var("LOCKOUT_MAX_FAILED_ATTEMPTS");
    }
}
