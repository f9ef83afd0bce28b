//! dfkit web layer
//!
//! Per-request controller helpers for axum applications: parameter lookup,
//! rendering control, redirects, referrer tracking and flash messages.

pub mod controller;
pub mod dispatcher;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
pub mod templates;
pub mod url_helper;
pub mod view;

// Re-export main types
pub use controller::Controller;
pub use dispatcher::{ActionName, Dispatcher};
pub use dfkit_core::{AppEnvironment, DfConfig, FlashLevel, FlashMessage};
pub use response::RedirectTarget;
pub use server::DfServer;
pub use session::{MemorySessionStore, Session, SessionData, SessionStore};
pub use state::AppState;
pub use url_helper::{RouteSpec, RouteTable, UrlHelper};
pub use view::{ViewContext, ViewRenderer};

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde_json::json;
use std::path::Path;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Create the demo application router
pub fn create_app(state: AppState) -> Router {
    build_app(routes::app_routes(), state)
}

/// Wrap application routes with the layers the controller helpers rely on.
///
/// The session middleware must wrap every route that extracts a
/// [`Controller`] or a [`Session`].
pub fn build_app(routes: Router<AppState>, state: AppState) -> Router {
    let body_limit = state.config.body_limit;

    routes
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable development mode
    pub dev_mode: bool,
    /// Maximum accepted request body, in bytes
    pub body_limit: usize,
    /// Application settings shared with the controller helpers
    pub app: DfConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_mode: false,
            body_limit: 2 * 1024 * 1024,
            app: DfConfig::default(),
        }
    }
}

impl WebConfig {
    /// Load configuration from an optional TOML file and the environment.
    ///
    /// `DFKIT_HOST`, `DFKIT_PORT` and `DFKIT_DEV_MODE` set the listener;
    /// application keys use the `DFKIT_` prefix with `__` between nested
    /// tables, e.g. `DFKIT_ENVIRONMENT=production` or
    /// `DFKIT_SESSION__TTL_SECS=600`.
    pub fn load(config_file: Option<&Path>) -> WebResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("DFKIT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let app: DfConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| WebError::Config(format!("Failed to load configuration: {}", e)))?;
        app.validate()?;

        let defaults = Self::default();
        Ok(Self {
            host: std::env::var("DFKIT_HOST").unwrap_or(defaults.host),
            port: std::env::var("DFKIT_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            dev_mode: std::env::var("DFKIT_DEV_MODE")
                .ok()
                .and_then(|flag| flag.parse().ok())
                .unwrap_or(defaults.dev_mode),
            body_limit: defaults.body_limit,
            app,
        })
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web layer
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] dfkit_core::DfError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Handler stopped early; the redirect is sent as the response.
    #[error("Request halted with redirect to {}", .0.location)]
    Halted(RedirectTarget),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::Halted(target) => target.status,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Core(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if let WebError::Halted(target) = self {
            return target.into_response();
        }

        let status = self.status_code();
        if status.is_server_error() {
            if let WebError::Core(core) = &self {
                core.log();
            } else {
                error!(error = %self, "Request failed");
            }
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Initialize logging for the web server
pub fn init_logging(config: &dfkit_core::LoggingConfig) -> WebResult<()> {
    dfkit_core::init_logging(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WebConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert!(!config.app.environment.is_production());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dfkit.toml");
        std::fs::write(
            &path,
            "environment = \"testing\"\nbase_url = \"http://shop.test\"\n\n[session]\ncookie_name = \"shop\"\n",
        )
        .unwrap();

        let config = WebConfig::load(Some(&path)).unwrap();
        assert_eq!(config.app.environment, AppEnvironment::Testing);
        assert_eq!(config.app.base_url(), Some("http://shop.test"));
        assert_eq!(config.app.session.cookie_name, "shop");
    }

    #[test]
    fn test_load_accepts_environment_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dfkit.toml");
        std::fs::write(&path, "environment = \"prod\"\n").unwrap();

        let config = WebConfig::load(Some(&path)).unwrap();
        assert!(config.app.environment.is_production());

        std::fs::write(&path, "environment = \"Production\"\n").unwrap();
        let config = WebConfig::load(Some(&path)).unwrap();
        assert!(config.app.environment.is_production());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            WebError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let missing_session = crate::session::missing_session();
        assert_eq!(
            missing_session.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(missing_session.to_string().starts_with("Session error"));
        let halted = WebError::Halted(RedirectTarget::new(
            "https://example.com/",
            StatusCode::MOVED_PERMANENTLY,
        ));
        assert_eq!(halted.status_code(), StatusCode::MOVED_PERMANENTLY);
        assert!(halted.to_string().contains("https://example.com/"));
    }
}
