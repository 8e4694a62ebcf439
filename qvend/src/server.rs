//! Server lifecycle management
//!
//! Starts the HTTP server and handles graceful shutdown on
//! SIGTERM or SIGINT.

use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use qvend_core::{
    events::EventHub,
    service::{AdminAuthService, UserService},
    Config,
};

/// Container for shared services
#[derive(Clone)]
pub struct Services {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AdminAuthService>,
    pub hub: Arc<EventHub>,
}

/// Console server, owns the HTTP component and the database pool
pub struct QvendServer {
    config: Config,
    services: Services,
    pool: PgPool,
}

impl QvendServer {
    pub const fn new(config: Config, services: Services, pool: PgPool) -> Self {
        Self {
            config,
            services,
            pool,
        }
    }

    /// Start the HTTP server and wait for a shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let http_handle = self.start_http_server(shutdown_rx).await?;

        info!("Server started");

        tokio::select! {
            _ = http_handle => {
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);

        self.shutdown().await;

        Ok(())
    }

    /// Gracefully shut down server components
    async fn shutdown(&self) {
        let active = self.services.hub.connection_count();
        if active > 0 {
            info!(
                "Closing {} active streaming connection(s)",
                active
            );
        }

        info!("Closing database connection pool...");
        self.pool.close().await;
        info!("Database pool closed");

        info!("Server shut down complete");
    }

    /// Start HTTP server with graceful shutdown support
    async fn start_http_server(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let http_address = self.config.http_address();

        let router = qvend_api::create_router(
            self.services.user_service.clone(),
            self.services.auth_service.clone(),
            self.services.hub.clone(),
        );

        let handle = tokio::spawn(async move {
            let http_addr: std::net::SocketAddr = match http_address.parse() {
                Ok(addr) => addr,
                Err(e) => {
                    error!("Invalid HTTP address '{}': {}", http_address, e);
                    return;
                }
            };

            let listener = match tokio::net::TcpListener::bind(http_addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind HTTP address {}: {}", http_addr, e);
                    return;
                }
            };

            info!("HTTP server listening on {}", http_addr);

            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
