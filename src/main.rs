/// Authentication Service Entry Point
///
/// Wires together:
/// - PostgreSQL connection pool
/// - Audit sink (Kafka when enabled, local logging otherwise)
/// - Authentication, token, session and MFA services
/// - Expiry sweeper (background task)
use anyhow::{Context, Result};
use auth_service::{
    config::Settings,
    services::{
        sweeper::spawn_expiry_sweeper, AuthService, KafkaAuditSink, LogAuditSink, MfaService,
        SessionService, SharedAuditSink, TokenService,
    },
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "auth_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Authentication Service");

    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    let audit: SharedAuditSink = if settings.kafka.enabled {
        let sink =
            KafkaAuditSink::new(&settings.kafka).context("Failed to create Kafka audit sink")?;
        info!(brokers = %settings.kafka.brokers, topic = %settings.kafka.topic, "Kafka audit sink enabled");
        Arc::new(sink)
    } else {
        info!("Kafka disabled; audit events will be logged locally");
        Arc::new(LogAuditSink)
    };

    let tokens = TokenService::new(
        pool.clone(),
        &settings.jwt,
        settings.session.single_session_per_user,
        audit.clone(),
    );
    let sessions = SessionService::new(pool.clone(), settings.session.clone(), audit.clone());
    let mfa = MfaService::new(pool.clone(), settings.mfa.clone(), audit.clone());
    // The transport layer plugs in here; the service handle stays alive for
    // the life of the process.
    let _auth = AuthService::new(
        pool.clone(),
        settings.lockout.clone(),
        tokens,
        sessions.clone(),
        mfa,
        audit,
    );

    let sweeper = spawn_expiry_sweeper(sessions);

    info!("Authentication service ready");

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    sweeper.abort();
    pool.close().await;
    info!("Authentication service stopped");

    Ok(())
}
