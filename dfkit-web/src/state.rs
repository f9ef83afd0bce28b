//! Application state shared by all requests

use crate::{
    routes, session::MemorySessionStore, session::SessionStore, templates::TemplateRegistry,
    url_helper::RouteTable, view::ViewRenderer, WebConfig, WebResult,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: WebConfig,
    /// Session backend used by the session middleware
    pub sessions: Arc<dyn SessionStore>,
    /// Named routes available to the URL helper
    pub routes: Arc<RouteTable>,
    /// Template backend
    pub views: Arc<dyn ViewRenderer>,
}

impl AppState {
    /// State for the bundled application: in-memory sessions, the demo
    /// route table and the askama templates.
    pub fn new(config: WebConfig) -> WebResult<Self> {
        config.app.validate()?;

        let sessions = MemorySessionStore::new(Duration::from_secs(config.app.session.ttl_secs));
        let state = Self::with_parts(
            config,
            Arc::new(sessions),
            Arc::new(routes::route_table()),
            Arc::new(TemplateRegistry::new()),
        );

        info!(
            environment = %state.config.app.environment,
            "Application state initialized"
        );
        Ok(state)
    }

    pub fn with_parts(
        config: WebConfig,
        sessions: Arc<dyn SessionStore>,
        routes: Arc<RouteTable>,
        views: Arc<dyn ViewRenderer>,
    ) -> Self {
        Self {
            config,
            sessions,
            routes,
            views,
        }
    }

    /// Purge expired sessions
    pub async fn cleanup_old_data(&self) -> usize {
        self.sessions.cleanup().await
    }
}
