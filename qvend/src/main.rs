mod server;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use qvend_core::{
    directory::{DirectoryClient, HttpDirectoryClient},
    events::EventHub,
    logging,
    repository::UserRepository,
    service::{AdminAuthService, UserService},
    Config,
};

use server::{QvendServer, Services};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config_file = std::env::args().nth(1);
    let config = Config::load(config_file.as_deref())?;

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Q profile vending console starting...");
    info!("HTTP address: {}", config.http_address());

    // 4. Initialize database
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
        .connect(config.database_url())
        .await?;

    // 5. Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            anyhow::anyhow!("Migration failed: {e}")
        })?;
    info!("Migrations completed");

    // 6. Initialize services
    let directory: Option<Arc<dyn DirectoryClient>> = if config.directory.enabled {
        info!("Directory integration enabled: {}", config.directory.base_url);
        Some(Arc::new(HttpDirectoryClient::new(&config.directory)?))
    } else {
        info!("Directory integration disabled, users get no external identity");
        None
    };

    let hub = Arc::new(EventHub::new(&config.events));
    info!(
        history_size = config.events.history_size,
        replay_window = config.events.replay_window,
        max_connections = config.events.max_connections,
        "Event hub initialized"
    );

    let auth_service = Arc::new(AdminAuthService::new(&config.auth)?);
    let user_service = Arc::new(UserService::new(
        UserRepository::new(pool.clone()),
        directory,
        hub.clone(),
    ));

    let services = Services {
        user_service,
        auth_service,
        hub,
    };

    // 7. Start the HTTP server and wait for shutdown
    let server = QvendServer::new(config, services, pool);
    server.start().await?;

    Ok(())
}
