use anyhow::Context;
use podium_api::{
    app,
    state::{AppState, AuthConfig, Backends},
    worker::start_notification_worker,
};
use podium_booking::NotificationDispatcher;
use podium_core::mailer::Mailer;
use podium_core::notify::Notifier;
use podium_store::{app_config::Config, DbClient, LogMailer, PgIdentityRepository, PgSlotRepository, RedisClient, SmtpMailer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "podium_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Podium API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Redis
    let redis = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to create Redis client")?;

    // Outbound email
    let mailer: Arc<dyn Mailer> = if config.smtp.enabled {
        Arc::new(SmtpMailer::new(&config.smtp).context("Failed to configure SMTP")?)
    } else {
        tracing::warn!("SMTP disabled; outbound email will only be logged");
        Arc::new(LogMailer)
    };

    // Notification queue + worker
    let (notifier, rx) = Notifier::channel(config.business_rules.notification_queue_capacity);
    let dispatcher = NotificationDispatcher::new(mailer, config.business_rules.io_timeout());
    tokio::spawn(start_notification_worker(rx, dispatcher));

    let backends = Backends {
        identities: Arc::new(PgIdentityRepository::new(db.pool.clone())),
        slots: Arc::new(PgSlotRepository::new(db.pool.clone())),
        kv: Arc::new(redis),
    };
    let app_state = AppState::new(
        backends,
        notifier,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        config.business_rules.clone(),
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
