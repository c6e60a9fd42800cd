// Integration tests for the authentication flows
//
// These tests verify end-to-end behavior against a real PostgreSQL database:
// - Registration and password login
// - Lockout after repeated failures
// - Refresh token rotation and replay rejection
// - TOTP enrollment, MFA login and one-shot backup codes
// - Session concurrency cap and heartbeats
//
// To run them locally:
//   docker-compose up -d postgres
//   DATABASE_URL=postgres://... cargo test --test auth_flow_test -- --nocapture

use auth_service::config::{JwtSettings, LockoutSettings, MfaSettings, SessionSettings};
use auth_service::error::AuthError;
use auth_service::models::session::REASON_MAX_SESSIONS_EXCEEDED;
use auth_service::security::totp;
use auth_service::services::{
    AuthService, ClientInfo, LogAuditSink, LoginOutcome, MfaService, SessionService,
    SharedAuditSink, TokenService,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const TEST_PASSWORD: &str = "Correct-Horse9Battery!";

async fn connect() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("⚠️  DATABASE_URL not set; skipping integration test");
            return None;
        }
    };

    let pool = match PgPoolOptions::new().max_connections(5).connect(&url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("⚠️  Failed to connect to PostgreSQL: {}", e);
            eprintln!("💡 Make sure postgres is running: docker-compose up -d postgres");
            return None;
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        eprintln!("⚠️  Failed to run migrations: {}", e);
        return None;
    }

    Some(pool)
}

struct TestHarness {
    auth: AuthService,
}

fn harness(pool: PgPool, max_sessions: i64, single_session_per_user: bool) -> TestHarness {
    let jwt = JwtSettings {
        secret: "integration-test-secret-at-least-this-long".to_string(),
        issuer: "auth-service-tests".to_string(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 604_800,
        mfa_temp_token_ttl_secs: 300,
    };
    let lockout = LockoutSettings {
        max_failed_attempts: 5,
        lock_duration_secs: 1800,
    };
    let session = SessionSettings {
        max_concurrent_sessions: max_sessions,
        inactivity_timeout_secs: 1800,
        sweep_interval_secs: 3600,
        single_session_per_user,
    };
    let mfa_settings = MfaSettings {
        issuer: "auth-service-tests".to_string(),
        backup_code_count: 10,
    };

    let audit: SharedAuditSink = Arc::new(LogAuditSink);
    let tokens = TokenService::new(pool.clone(), &jwt, single_session_per_user, audit.clone());
    let sessions = SessionService::new(pool.clone(), session, audit.clone());
    let mfa = MfaService::new(pool.clone(), mfa_settings, audit.clone());
    let auth = AuthService::new(pool, lockout, tokens, sessions, mfa, audit);

    TestHarness { auth }
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

fn current_code(secret_base32: &str) -> String {
    let secret = totp::decode_secret(secret_base32).expect("stored secret decodes");
    totp::code_at(&secret, now_unix()).expect("code generation")
}

async fn register_user(h: &TestHarness, prefix: &str) -> auth_service::models::user::User {
    let username = unique_name(prefix);
    let email = format!("{}@example.com", username);
    h.auth
        .register(&username, &email, TEST_PASSWORD, TEST_PASSWORD)
        .await
        .expect("registration succeeds")
}

async fn login_success(
    h: &TestHarness,
    username: &str,
) -> auth_service::services::auth::LoginSuccess {
    match h
        .auth
        .login(username, TEST_PASSWORD, &ClientInfo::default())
        .await
        .expect("login succeeds")
    {
        LoginOutcome::Success(success) => *success,
        LoginOutcome::MfaRequired { .. } => panic!("did not expect an MFA challenge"),
    }
}

#[tokio::test]
async fn password_login_issues_tokens_and_session() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "login").await;
    let success = login_success(&h, &user.username).await;

    assert_eq!(success.user.id, user.id);
    assert!(!success.tokens.access_token.is_empty());
    assert!(!success.tokens.refresh_token.is_empty());
    assert_eq!(success.tokens.token_type, "Bearer");
    assert_eq!(success.tokens.expires_in, 900);

    let sessions = h
        .auth
        .sessions()
        .list_active(user.id)
        .await
        .expect("list sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, success.session_id);
}

#[tokio::test]
async fn login_with_unknown_identifier_fails() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let result = h
        .auth
        .login("no-such-user", TEST_PASSWORD, &ClientInfo::default())
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn fifth_failure_locks_and_correct_password_stays_locked() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "lockout").await;
    let client = ClientInfo::default();

    for attempt in 1..=4 {
        let result = h.auth.login(&user.username, "Wrong-Pass1!", &client).await;
        assert!(
            matches!(result, Err(AuthError::InvalidCredentials)),
            "attempt {} should fail without locking",
            attempt
        );
    }

    // Attempt 5 crosses the threshold.
    let result = h.auth.login(&user.username, "Wrong-Pass1!", &client).await;
    let locked_until = match result {
        Err(AuthError::AccountLocked(until)) => until,
        other => panic!("expected lock on fifth failure, got {:?}", other),
    };
    assert!(locked_until > chrono::Utc::now());

    // Correct password during the lock window still fails.
    let result = h.auth.login(&user.username, TEST_PASSWORD, &client).await;
    assert!(matches!(result, Err(AuthError::AccountLocked(_))));
}

#[tokio::test]
async fn successful_login_resets_failure_counter() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool.clone(), 5, false);

    let user = register_user(&h, "reset").await;
    let client = ClientInfo::default();

    for _ in 0..3 {
        let _ = h.auth.login(&user.username, "Wrong-Pass1!", &client).await;
    }
    login_success(&h, &user.username).await;

    let reloaded = auth_service::db::users::find_by_id(&pool, user.id)
        .await
        .expect("query user")
        .expect("user exists");
    assert_eq!(reloaded.failed_login_attempts, 0);
    assert!(reloaded.locked_until.is_none());
    assert!(reloaded.last_login.is_some());
}

#[tokio::test]
async fn refresh_rotation_rejects_replay() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "rotate").await;
    let success = login_success(&h, &user.username).await;
    let client = ClientInfo::default();

    let rotated = h
        .auth
        .tokens()
        .refresh(&success.tokens.refresh_token, &client)
        .await
        .expect("first rotation succeeds");
    assert_ne!(rotated.refresh_token, success.tokens.refresh_token);

    // The consumed token must never work again.
    let replay = h
        .auth
        .tokens()
        .refresh(&success.tokens.refresh_token, &client)
        .await;
    assert!(matches!(replay, Err(AuthError::TokenInvalid)));

    // The rotated token is still live.
    h.auth
        .tokens()
        .refresh(&rotated.refresh_token, &client)
        .await
        .expect("rotated token refreshes");
}

#[tokio::test]
async fn revoke_all_kills_outstanding_refresh_tokens() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "revoke").await;
    let first = login_success(&h, &user.username).await;
    let second = login_success(&h, &user.username).await;

    let revoked = h
        .auth
        .tokens()
        .revoke_all(user.id)
        .await
        .expect("revoke all");
    assert_eq!(revoked, 2);

    for pair in [&first.tokens, &second.tokens] {
        let result = h
            .auth
            .tokens()
            .refresh(&pair.refresh_token, &ClientInfo::default())
            .await;
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }
}

#[tokio::test]
async fn session_cap_evicts_oldest() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 2, false);

    let user = register_user(&h, "cap").await;
    let first = login_success(&h, &user.username).await;
    let _second = login_success(&h, &user.username).await;
    let _third = login_success(&h, &user.username).await;

    let active = h
        .auth
        .sessions()
        .list_active(user.id)
        .await
        .expect("list sessions");
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|s| s.id != first.session_id));

    let evicted = h
        .auth
        .sessions()
        .find(first.session_id)
        .await
        .expect("find session")
        .expect("session row survives eviction");
    assert!(!evicted.is_active);
    assert_eq!(
        evicted.terminated_reason.as_deref(),
        Some(REASON_MAX_SESSIONS_EXCEEDED)
    );
}

#[tokio::test]
async fn concurrent_logins_never_exceed_session_cap() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 1, false);

    let user = register_user(&h, "race").await;
    let user_id = user.id;

    // Pairs of simultaneous creates must serialize on the principal; the
    // cap holds even when both start from an empty session set.
    for round in 0..5 {
        let s1 = h.auth.sessions().clone();
        let s2 = h.auth.sessions().clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { s1.create(user_id, &ClientInfo::default()).await }),
            tokio::spawn(async move { s2.create(user_id, &ClientInfo::default()).await }),
        );
        a.expect("task").expect("first create");
        b.expect("task").expect("second create");

        let active = h
            .auth
            .sessions()
            .list_active(user.id)
            .await
            .expect("list sessions");
        assert_eq!(
            active.len(),
            1,
            "round {}: cap of 1 exceeded with {} active sessions",
            round,
            active.len()
        );
    }
}

#[tokio::test]
async fn heartbeat_is_a_noop_on_terminated_sessions() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "heartbeat").await;
    let success = login_success(&h, &user.username).await;

    assert!(h
        .auth
        .sessions()
        .heartbeat(success.session_id)
        .await
        .expect("heartbeat live session"));

    h.auth
        .logout(
            &success.tokens.refresh_token,
            Some(success.session_id),
            &ClientInfo::default(),
        )
        .await
        .expect("logout");

    // Terminated sessions stay terminated.
    assert!(!h
        .auth
        .sessions()
        .heartbeat(success.session_id)
        .await
        .expect("heartbeat dead session"));
}

#[tokio::test]
async fn single_session_policy_revokes_previous_chain() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, true);

    let user = register_user(&h, "single").await;
    let first = login_success(&h, &user.username).await;
    let _second = login_success(&h, &user.username).await;

    let result = h
        .auth
        .tokens()
        .refresh(&first.tokens.refresh_token, &ClientInfo::default())
        .await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));

    let active = h
        .auth
        .sessions()
        .list_active(user.id)
        .await
        .expect("list sessions");
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn mfa_enrollment_challenge_and_backup_codes() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "mfa").await;
    let client = ClientInfo::default();

    let enrollment = h.auth.mfa().enroll(&user).await.expect("enroll");
    assert_eq!(enrollment.backup_codes.len(), 10);
    assert!(enrollment.provisioning_uri.starts_with("otpauth://totp/"));

    // MFA is not live until the pending secret is verified once.
    login_success(&h, &user.username).await;

    h.auth
        .mfa()
        .activate(&user, &current_code(&enrollment.secret_base32))
        .await
        .expect("activation with a valid code");

    // Password alone now yields a challenge, not tokens.
    let temp_token = match h
        .auth
        .login(&user.username, TEST_PASSWORD, &client)
        .await
        .expect("password step")
    {
        LoginOutcome::MfaRequired { temp_token } => temp_token,
        LoginOutcome::Success(_) => panic!("expected an MFA challenge"),
    };

    let wrong = h.auth.complete_mfa(&temp_token, "000000", &client).await;
    assert!(matches!(wrong, Err(AuthError::InvalidMfaCode)));

    let success = h
        .auth
        .complete_mfa(
            &temp_token,
            &current_code(&enrollment.secret_base32),
            &client,
        )
        .await
        .expect("challenge completes with a fresh code");
    assert!(!success.tokens.access_token.is_empty());

    // A backup code satisfies the challenge exactly once.
    let backup = enrollment.backup_codes[0].clone();
    let temp_token = match h
        .auth
        .login(&user.username, TEST_PASSWORD, &client)
        .await
        .expect("password step")
    {
        LoginOutcome::MfaRequired { temp_token } => temp_token,
        LoginOutcome::Success(_) => panic!("expected an MFA challenge"),
    };
    h.auth
        .complete_mfa(&temp_token, &backup, &client)
        .await
        .expect("backup code accepted");

    let temp_token = match h
        .auth
        .login(&user.username, TEST_PASSWORD, &client)
        .await
        .expect("password step")
    {
        LoginOutcome::MfaRequired { temp_token } => temp_token,
        LoginOutcome::Success(_) => panic!("expected an MFA challenge"),
    };
    let replay = h.auth.complete_mfa(&temp_token, &backup, &client).await;
    assert!(matches!(replay, Err(AuthError::InvalidMfaCode)));
}

#[tokio::test]
async fn mfa_temp_token_is_not_an_access_token() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "purpose").await;
    let enrollment = h.auth.mfa().enroll(&user).await.expect("enroll");
    h.auth
        .mfa()
        .activate(&user, &current_code(&enrollment.secret_base32))
        .await
        .expect("activate");

    let temp_token = match h
        .auth
        .login(&user.username, TEST_PASSWORD, &ClientInfo::default())
        .await
        .expect("password step")
    {
        LoginOutcome::MfaRequired { temp_token } => temp_token,
        LoginOutcome::Success(_) => panic!("expected an MFA challenge"),
    };

    use auth_service::security::jwt::TokenPurpose;
    let result = h
        .auth
        .tokens()
        .jwt()
        .validate(&temp_token, TokenPurpose::Access);
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn disabling_mfa_requires_a_code_and_revokes_credentials() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool.clone(), 5, false);

    let user = register_user(&h, "disable").await;
    let enrollment = h.auth.mfa().enroll(&user).await.expect("enroll");
    h.auth
        .mfa()
        .activate(&user, &current_code(&enrollment.secret_base32))
        .await
        .expect("activate");

    let bad = h.auth.mfa().disable(&user, "000000").await;
    assert!(matches!(bad, Err(AuthError::InvalidMfaCode)));

    h.auth
        .mfa()
        .disable(&user, &current_code(&enrollment.secret_base32))
        .await
        .expect("disable with valid code");

    let reloaded = auth_service::db::users::find_by_id(&pool, user.id)
        .await
        .expect("query user")
        .expect("user exists");
    assert!(!reloaded.mfa_enabled);

    // MFA is off, so login goes straight through again.
    login_success(&h, &user.username).await;
}

#[tokio::test]
async fn change_password_revokes_tokens_and_sessions() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "passwd").await;
    let success = login_success(&h, &user.username).await;

    let new_password = "Fresh-Stable7Horizon?";
    h.auth
        .change_password(user.id, TEST_PASSWORD, new_password, new_password)
        .await
        .expect("change password");

    let refresh = h
        .auth
        .tokens()
        .refresh(&success.tokens.refresh_token, &ClientInfo::default())
        .await;
    assert!(matches!(refresh, Err(AuthError::TokenInvalid)));

    let active = h
        .auth
        .sessions()
        .list_active(user.id)
        .await
        .expect("list sessions");
    assert!(active.is_empty());

    let result = h
        .auth
        .login(&user.username, TEST_PASSWORD, &ClientInfo::default())
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));

    match h
        .auth
        .login(&user.username, new_password, &ClientInfo::default())
        .await
        .expect("login with new password")
    {
        LoginOutcome::Success(_) => {}
        LoginOutcome::MfaRequired { .. } => panic!("did not expect an MFA challenge"),
    }
}

#[tokio::test]
async fn change_password_rejects_reuse_of_current_password() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "reuse").await;

    let result = h
        .auth
        .change_password(user.id, TEST_PASSWORD, TEST_PASSWORD, TEST_PASSWORD)
        .await;
    assert!(matches!(result, Err(AuthError::WeakPassword(_))));

    // The old password still works; nothing was revoked.
    login_success(&h, &user.username).await;
}

#[tokio::test]
async fn mfa_temp_token_completes_only_one_challenge() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "oneshot").await;
    let client = ClientInfo::default();

    let enrollment = h.auth.mfa().enroll(&user).await.expect("enroll");
    h.auth
        .mfa()
        .activate(&user, &current_code(&enrollment.secret_base32))
        .await
        .expect("activate");

    let temp_token = match h
        .auth
        .login(&user.username, TEST_PASSWORD, &client)
        .await
        .expect("password step")
    {
        LoginOutcome::MfaRequired { temp_token } => temp_token,
        LoginOutcome::Success(_) => panic!("expected an MFA challenge"),
    };

    h.auth
        .complete_mfa(&temp_token, &enrollment.backup_codes[0], &client)
        .await
        .expect("first redemption succeeds");

    // A second redemption of the same temp token must fail even though the
    // code itself is a valid, unconsumed backup code.
    let replay = h
        .auth
        .complete_mfa(&temp_token, &enrollment.backup_codes[1], &client)
        .await;
    assert!(matches!(replay, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn registration_enforces_uniqueness_and_strength() {
    let Some(pool) = connect().await else { return };
    let h = harness(pool, 5, false);

    let user = register_user(&h, "unique").await;

    let taken = h
        .auth
        .register(
            &user.username,
            "other@example.com",
            TEST_PASSWORD,
            TEST_PASSWORD,
        )
        .await;
    assert!(matches!(taken, Err(AuthError::UsernameAlreadyExists)));

    let email_taken = h
        .auth
        .register(
            &unique_name("unique"),
            &user.email,
            TEST_PASSWORD,
            TEST_PASSWORD,
        )
        .await;
    assert!(matches!(email_taken, Err(AuthError::EmailAlreadyExists)));

    let weak = h
        .auth
        .register(
            &unique_name("weak"),
            "weak@example.com",
            "password",
            "password",
        )
        .await;
    assert!(matches!(weak, Err(AuthError::WeakPassword(_))));

    let mismatch = h
        .auth
        .register(
            &unique_name("mismatch"),
            "mismatch@example.com",
            TEST_PASSWORD,
            "Other-Pass1!xyz",
        )
        .await;
    assert!(matches!(mismatch, Err(AuthError::PasswordMismatch)));
}
