/// Token issuance, rotation and revocation
///
/// Access tokens are short-lived JWTs and are never stored. Refresh tokens
/// are opaque random strings held by the client; the database only sees
/// their SHA-256 hashes.
use crate::config::JwtSettings;
use crate::db;
use crate::error::Result;
use crate::models::audit::{AuditEvent, AuditEventKind};
use crate::models::user::User;
use crate::security::jwt::JwtProvider;
use crate::security::tokens::{generate_opaque_token, hash_token};
use crate::services::{ClientInfo, SharedAuditSink};
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// Issued credential pair returned to the client. The refresh token appears
/// here in the clear exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    pool: PgPool,
    jwt: JwtProvider,
    refresh_ttl_secs: i64,
    /// When set, issuing a new pair first revokes all outstanding refresh
    /// tokens so at most one chain is live per principal.
    single_session_per_user: bool,
    audit: SharedAuditSink,
}

impl TokenService {
    pub fn new(
        pool: PgPool,
        settings: &JwtSettings,
        single_session_per_user: bool,
        audit: SharedAuditSink,
    ) -> Self {
        Self {
            pool,
            jwt: JwtProvider::new(settings),
            refresh_ttl_secs: settings.refresh_token_ttl_secs,
            single_session_per_user,
            audit,
        }
    }

    pub fn jwt(&self) -> &JwtProvider {
        &self.jwt
    }

    /// Mint an access/refresh pair for an already-authenticated principal
    pub async fn issue_pair(&self, user: &User, client: &ClientInfo) -> Result<TokenPair> {
        if self.single_session_per_user {
            let revoked = db::refresh_tokens::revoke_all_for_user(&self.pool, user.id).await?;
            if revoked > 0 {
                info!(user_id = %user.id, revoked, "Revoked prior refresh tokens (single session policy)");
            }
        }

        let access_token = self.jwt.generate_access_token(user)?;
        let refresh_token = generate_opaque_token();
        let expires_at = Utc::now() + Duration::seconds(self.refresh_ttl_secs);

        db::refresh_tokens::create(
            &self.pool,
            user.id,
            &hash_token(&refresh_token),
            expires_at,
            client.ip(),
            client.agent(),
        )
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.jwt.access_ttl_secs(),
        })
    }

    /// Rotate a refresh token: the presented token is revoked and replaced
    /// atomically, so a replayed token always fails.
    pub async fn refresh(&self, refresh_token: &str, client: &ClientInfo) -> Result<TokenPair> {
        let old_hash = hash_token(refresh_token);
        let new_token = generate_opaque_token();
        let expires_at = Utc::now() + Duration::seconds(self.refresh_ttl_secs);

        let rotated = match db::refresh_tokens::rotate(
            &self.pool,
            &old_hash,
            &hash_token(&new_token),
            expires_at,
            client.ip(),
            client.agent(),
        )
        .await
        {
            Ok(rotated) => rotated,
            Err(e) => {
                warn!("Refresh token rotation rejected: {}", e);
                self.audit.record(
                    AuditEvent::new(AuditEventKind::TokenRefreshed, false)
                        .with_reason(&e.to_string())
                        .with_client(client.ip(), client.agent()),
                );
                return Err(e);
            }
        };

        let user = db::users::find_by_id(&self.pool, rotated.user_id)
            .await?
            .ok_or(crate::error::AuthError::UserNotFound)?;

        // A token chain must die with the account it belongs to.
        if let Err(e) = self.check_account(&user) {
            db::refresh_tokens::revoke_all_for_user(&self.pool, user.id).await?;
            self.audit.record(
                AuditEvent::new(AuditEventKind::TokenRefreshed, false)
                    .with_user(user.id, &user.username)
                    .with_reason(&e.to_string())
                    .with_client(client.ip(), client.agent()),
            );
            return Err(e);
        }

        let access_token = self.jwt.generate_access_token(&user)?;

        self.audit.record(
            AuditEvent::new(AuditEventKind::TokenRefreshed, true)
                .with_user(user.id, &user.username)
                .with_client(client.ip(), client.agent()),
        );

        Ok(TokenPair {
            access_token,
            refresh_token: new_token,
            token_type: "Bearer",
            expires_in: self.jwt.access_ttl_secs(),
        })
    }

    /// Revoke a single refresh token (logout)
    pub async fn revoke(&self, refresh_token: &str) -> Result<bool> {
        db::refresh_tokens::revoke_by_hash(&self.pool, &hash_token(refresh_token)).await
    }

    /// Revoke every outstanding refresh token for a principal
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        db::refresh_tokens::revoke_all_for_user(&self.pool, user_id).await
    }

    fn check_account(&self, user: &User) -> Result<()> {
        use crate::error::AuthError;
        use crate::models::user::AccountState;

        match user.account_state_at(Utc::now()) {
            AccountState::Active => Ok(()),
            AccountState::Disabled => Err(AuthError::AccountDisabled),
            AccountState::Locked(until) => Err(AuthError::AccountLocked(until)),
        }
    }
}
