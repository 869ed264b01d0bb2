use std::{str::FromStr, sync::Arc, time::Duration};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice::{
    api,
    config::Settings,
    integrations::{IntegrationManager, webhook::WebhookIntegration},
    payments,
    service::{sweeper, ServiceContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Boxoffice server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database. WAL lets readers proceed while a booking
    // transaction holds the write lock; writers wait up to the busy timeout.
    let connect_options = SqliteConnectOptions::from_str(&settings.database.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(settings.database.busy_timeout_secs));

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(connect_options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Initialize integration manager
    let integration_manager = Arc::new(IntegrationManager::new());

    if let Some(webhook) = WebhookIntegration::new(settings.integrations.webhook.clone()) {
        integration_manager.register(Arc::new(webhook)).await;
    }

    // Check integration health
    let health_results = integration_manager.health_check_all().await;
    for (name, result) in health_results {
        match result {
            Ok(_) => tracing::info!("Integration {} is healthy", name),
            Err(e) => tracing::warn!("Integration {} health check failed: {:?}", name, e),
        }
    }

    let gateway = payments::build_gateway(&settings.payments, &settings.server)?;

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        gateway,
        integration_manager,
        settings.payments.currency.clone(),
    ));

    let _sweeper = sweeper::spawn_pending_sweeper(
        service_context.booking_service.clone(),
        &settings.booking,
    );

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
