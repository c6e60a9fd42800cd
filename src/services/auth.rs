/// Core authentication flows: login under the lockout policy, the MFA
/// challenge step, logout, registration and password change.
use crate::config::LockoutSettings;
use crate::db;
use crate::error::{AuthError, Result};
use crate::models::audit::{AuditEvent, AuditEventKind};
use crate::models::session::{Session, REASON_PASSWORD_CHANGED, REASON_USER_LOGOUT};
use crate::models::user::{AccountState, User};
use crate::security::jwt::TokenPurpose;
use crate::security::password::{hash_password, passwords_match, verify_password};
use crate::services::{ClientInfo, MfaService, SessionService, SharedAuditSink, TokenService};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a fully authenticated login hands back to the client
#[derive(Debug, Clone, Serialize)]
pub struct LoginSuccess {
    pub user: User,
    #[serde(flatten)]
    pub tokens: crate::services::TokenPair,
    pub session_id: Uuid,
}

/// Outcome of the first login step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginOutcome {
    Success(Box<LoginSuccess>),
    /// Password accepted but a second factor is required. The temp token
    /// proves the password step and nothing else.
    MfaRequired { temp_token: String },
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    lockout: LockoutSettings,
    tokens: TokenService,
    sessions: SessionService,
    mfa: MfaService,
    audit: SharedAuditSink,
}

impl AuthService {
    pub fn new(
        pool: PgPool,
        lockout: LockoutSettings,
        tokens: TokenService,
        sessions: SessionService,
        mfa: MfaService,
        audit: SharedAuditSink,
    ) -> Self {
        Self {
            pool,
            lockout,
            tokens,
            sessions,
            mfa,
            audit,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    pub fn mfa(&self) -> &MfaService {
        &self.mfa
    }

    /// First login step: identifier plus password, checked under the
    /// lockout policy. A correct password during an active lock window still
    /// fails, and does not touch the attempt counter.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome> {
        let user = match db::users::find_by_username_or_email(&self.pool, identifier).await? {
            Some(user) => user,
            None => {
                self.audit.record(
                    AuditEvent::new(AuditEventKind::LoginFailed, false)
                        .with_username(identifier)
                        .with_reason("unknown identifier")
                        .with_client(client.ip(), client.agent()),
                );
                return Err(AuthError::InvalidCredentials);
            }
        };

        // Disabled wins over locked; both win over the password check.
        match user.account_state_at(Utc::now()) {
            AccountState::Disabled => {
                self.record_login_failure(&user, "account disabled", client);
                return Err(AuthError::AccountDisabled);
            }
            AccountState::Locked(until) => {
                self.record_login_failure(&user, "account locked", client);
                return Err(AuthError::AccountLocked(until));
            }
            AccountState::Active => {}
        }

        if !verify_password(password, &user.password_hash)? {
            let updated = db::users::record_failed_login(
                &self.pool,
                user.id,
                self.lockout.max_failed_attempts,
                self.lockout.lock_duration_secs,
            )
            .await?;

            self.record_login_failure(&updated, "bad password", client);

            if let AccountState::Locked(until) = updated.account_state_at(Utc::now()) {
                warn!(user_id = %updated.id, attempts = updated.failed_login_attempts, "Account locked after repeated failures");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::AccountLocked, true)
                        .with_user(updated.id, &updated.username)
                        .with_client(client.ip(), client.agent()),
                );
                return Err(AuthError::AccountLocked(until));
            }
            return Err(AuthError::InvalidCredentials);
        }

        if user.mfa_enabled {
            // Counter reset and session creation wait for the second factor.
            let temp_token = self.tokens.jwt().generate_mfa_temp_token(&user)?;
            return Ok(LoginOutcome::MfaRequired { temp_token });
        }

        let success = self.finish_login(user, client).await?;
        Ok(LoginOutcome::Success(Box::new(success)))
    }

    /// Second login step: redeem the MFA temp token with a TOTP or backup
    /// code. The temp token is purpose-bound, cannot be used as an access
    /// token, and completes at most one challenge: its `jti` is checked off
    /// on success and a replay fails even with a valid code.
    pub async fn complete_mfa(
        &self,
        temp_token: &str,
        code: &str,
        client: &ClientInfo,
    ) -> Result<LoginSuccess> {
        let claims = self.tokens.jwt().validate(temp_token, TokenPurpose::Mfa)?;
        let jti = Uuid::parse_str(&claims.jti).map_err(|_| AuthError::TokenInvalid)?;
        let expires_at =
            chrono::DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::TokenInvalid)?;

        let user = db::users::find_by_id(&self.pool, claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // Account state may have changed since the password step.
        match user.account_state_at(Utc::now()) {
            AccountState::Disabled => return Err(AuthError::AccountDisabled),
            AccountState::Locked(until) => return Err(AuthError::AccountLocked(until)),
            AccountState::Active => {}
        }

        self.mfa.verify_login_code(&user, code).await?;

        // Consume the jti only after the code passes, so a mistyped code
        // does not burn the token. The conditional insert makes the consume
        // atomic under concurrent redemption.
        if !db::mfa_challenges::consume_jti(&self.pool, jti, user.id, expires_at).await? {
            warn!(user_id = %user.id, "MFA temp token replay rejected");
            return Err(AuthError::TokenInvalid);
        }

        self.finish_login(user, client).await
    }

    /// Revoke the presented refresh token and close its session
    pub async fn logout(
        &self,
        refresh_token: &str,
        session_id: Option<Uuid>,
        client: &ClientInfo,
    ) -> Result<()> {
        let revoked = self.tokens.revoke(refresh_token).await?;
        if let Some(session_id) = session_id {
            self.sessions
                .terminate(session_id, REASON_USER_LOGOUT)
                .await?;
        }

        self.audit.record(
            AuditEvent::new(AuditEventKind::Logout, revoked)
                .with_client(client.ip(), client.agent()),
        );
        Ok(())
    }

    /// Create a new principal with the default role
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<User> {
        passwords_match(password, confirmation)?;

        if db::users::username_exists(&self.pool, username).await? {
            return Err(AuthError::UsernameAlreadyExists);
        }
        if db::users::email_exists(&self.pool, email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        let user = db::users::create_user(
            &self.pool,
            username,
            email,
            &password_hash,
            &["USER".to_string()],
        )
        .await?;

        info!(user_id = %user.id, username, "User registered");
        self.audit.record(
            AuditEvent::new(AuditEventKind::UserCreated, true).with_user(user.id, &user.username),
        );
        Ok(user)
    }

    /// Change the account password. Every refresh token and session dies
    /// with the old password.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<()> {
        let user = db::users::find_by_id(&self.pool, user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        passwords_match(new_password, confirmation)?;

        if verify_password(new_password, &user.password_hash)? {
            return Err(AuthError::WeakPassword(
                "New password must differ from the current password".to_string(),
            ));
        }

        let password_hash = hash_password(new_password)?;
        db::users::update_password(&self.pool, user.id, &password_hash).await?;

        self.tokens.revoke_all(user.id).await?;
        self.sessions
            .terminate_all(user.id, REASON_PASSWORD_CHANGED)
            .await?;

        info!(user_id = %user.id, "Password changed; credentials revoked");
        self.audit.record(
            AuditEvent::new(AuditEventKind::PasswordChanged, true)
                .with_user(user.id, &user.username),
        );
        Ok(())
    }

    async fn finish_login(&self, user: User, client: &ClientInfo) -> Result<LoginSuccess> {
        db::users::record_successful_login(&self.pool, user.id).await?;

        let session = self.open_session(&user, client).await?;
        let tokens = self.tokens.issue_pair(&user, client).await?;

        info!(user_id = %user.id, session_id = %session.id, "Login complete");
        self.audit.record(
            AuditEvent::new(AuditEventKind::LoginSucceeded, true)
                .with_user(user.id, &user.username)
                .with_client(client.ip(), client.agent()),
        );

        Ok(LoginSuccess {
            session_id: session.id,
            tokens,
            user,
        })
    }

    async fn open_session(&self, user: &User, client: &ClientInfo) -> Result<Session> {
        self.sessions.create(user.id, client).await
    }

    fn record_login_failure(&self, user: &User, reason: &str, client: &ClientInfo) {
        self.audit.record(
            AuditEvent::new(AuditEventKind::LoginFailed, false)
                .with_user(user.id, &user.username)
                .with_reason(reason)
                .with_client(client.ip(), client.agent()),
        );
    }
}
