/// Identity Service Main Entry Point
///
/// Starts the HTTP API with:
/// - PostgreSQL connection pool (users, email OTPs)
/// - Kafka event producer (UserRegistered, OtpGenerated)
/// - OTP sweeper (background task)
use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use identity_service::{
    config::Settings,
    db::{PgOtpRepository, PgTxBackend, PgUserRepository, TxManager},
    http::{start_http_server, HttpServerState},
    security::TokenIssuer,
    services::{
        spawn_otp_sweeper, AuthService, KafkaEventProducer, OAuthClient, OtpManager,
        OtpSweeperConfig,
    },
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "identity_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Identity Service");

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let tokens = TokenIssuer::from_settings(&settings.jwt).context("Invalid JWT settings")?;

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .idle_timeout(Duration::from_secs(settings.database.idle_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!(
        "Database pool initialized with {} max connections",
        settings.database.max_connections
    );

    // Run database migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    // Registration cannot complete without the broker, so Kafka is mandatory.
    let kafka_producer =
        KafkaEventProducer::new(&settings.kafka).context("Failed to create Kafka producer")?;
    info!(brokers = %settings.kafka.brokers.join(","), "Kafka producer initialized");

    let otp_ttl = i64::try_from(settings.otp.ttl_seconds).context("OTP_TTL_SECONDS too large")?;
    let otp_retention =
        i64::try_from(settings.otp.retention_seconds).context("OTP_RETENTION_SECONDS too large")?;
    let otps = OtpManager::with_ttl(
        Arc::new(PgOtpRepository::new(db_pool.clone())),
        ChronoDuration::seconds(otp_ttl),
    );

    let auth = AuthService::new(
        Arc::new(PgUserRepository::new(db_pool.clone())),
        otps.clone(),
        Arc::new(kafka_producer),
        TxManager::new(Arc::new(PgTxBackend::new(db_pool.clone()))),
        tokens.clone(),
    );

    let sweeper = spawn_otp_sweeper(
        otps,
        OtpSweeperConfig {
            interval: Duration::from_secs(settings.otp.sweep_interval_seconds.max(1)),
            retention: ChronoDuration::seconds(otp_retention),
        },
    );

    let state = HttpServerState {
        auth,
        oauth: Arc::new(OAuthClient::new(settings.oauth.clone())?),
        token_ttl_seconds: tokens.ttl().num_seconds(),
    };

    start_http_server(
        state,
        &settings.server.host,
        settings.server.port,
        Duration::from_secs(settings.server.request_timeout),
        shutdown_signal(),
    )
    .await?;

    sweeper.abort();
    db_pool.close().await;
    info!("Identity service shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutting down gracefully...");
}
