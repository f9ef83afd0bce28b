//! dfkit web server
//!
//! Serves the demo application and purges expired sessions in the background.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Web server bound to one configuration
pub struct DfServer {
    config: WebConfig,
    state: AppState,
}

impl DfServer {
    pub fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone())?;

        Ok(Self { config, state })
    }

    /// Start the web server; returns after ctrl-c
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!(
            address = %address,
            environment = %self.config.app.environment,
            dev_mode = self.config.dev_mode,
            "Starting dfkit web server"
        );

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        let cleanup_state = self.state.clone();
        let cleanup_every = Duration::from_secs(self.config.app.session.cleanup_interval_secs);
        let cleanup = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_every);
            loop {
                interval.tick().await;
                let removed = cleanup_state.cleanup_old_data().await;
                debug!(removed, "Session cleanup finished");
            }
        });

        let result = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        cleanup.abort();

        if let Err(e) = result {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down gracefully");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for DfServer
pub struct DfServerBuilder {
    config: WebConfig,
}

impl DfServerBuilder {
    pub fn new() -> Self {
        Self {
            config: WebConfig::default(),
        }
    }

    /// Start from a loaded configuration
    pub fn with_config(config: WebConfig) -> Self {
        Self { config }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable development mode
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.dev_mode = dev_mode;
        self
    }

    pub fn environment(mut self, environment: crate::AppEnvironment) -> Self {
        self.config.app.environment = environment;
        self
    }

    /// Fixed base URL for generated links and redirects
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config.app.base_url = Some(base_url.into());
        self
    }

    /// Build the server
    pub fn build(self) -> WebResult<DfServer> {
        DfServer::new(self.config)
    }
}

impl Default for DfServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a server configured from the environment
pub async fn start_server() -> WebResult<()> {
    let config = WebConfig::load(None)?;
    let server = DfServer::new(config)?;
    server.start().await
}
