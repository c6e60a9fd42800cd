/// JWT minting and validation (HMAC-SHA-512)
///
/// Two purposes share the signing key: short-lived access tokens carrying
/// authorization claims, and MFA temp tokens that identify a principal
/// mid-login and nothing else. Purpose is a claim, checked on validation, so
/// one kind is never accepted where the other is expected.
use crate::config::JwtSettings;
use crate::error::{AuthError, Result};
use crate::models::User;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Mfa,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

#[derive(Clone)]
pub struct JwtProvider {
    secret: String,
    issuer: String,
    access_ttl_secs: i64,
    mfa_ttl_secs: i64,
}

impl JwtProvider {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            secret: settings.secret.clone(),
            issuer: settings.issuer.clone(),
            access_ttl_secs: settings.access_token_ttl_secs,
            mfa_ttl_secs: settings.mfa_temp_token_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Mint an access token carrying the principal's authorization claims
    pub fn generate_access_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenPurpose::Access, self.access_ttl_secs, user.roles.clone())
    }

    /// Mint a purpose-scoped MFA temp token: identifies the principal
    /// mid-flow, carries no authorization claims.
    pub fn generate_mfa_temp_token(&self, user: &User) -> Result<String> {
        self.generate(user, TokenPurpose::Mfa, self.mfa_ttl_secs, Vec::new())
    }

    fn generate(
        &self,
        user: &User,
        purpose: TokenPurpose,
        ttl_secs: i64,
        roles: Vec<String>,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            user_id: user.id,
            email: user.email.clone(),
            roles,
            purpose,
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_secs,
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Validate signature, issuer, and expiry, then check the purpose claim.
    /// Expired tokens surface as `TokenExpired`; everything else collapses to
    /// `TokenInvalid`.
    pub fn validate(&self, token: &str, expected: TokenPurpose) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;

        if data.claims.purpose != expected {
            tracing::debug!(
                "Token purpose mismatch: got {:?}, expected {:?}",
                data.claims.purpose,
                expected
            );
            return Err(AuthError::TokenInvalid);
        }

        Ok(data.claims)
    }
}
