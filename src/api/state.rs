//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::attribution::AttributionTracker;
use crate::auth::AuthProvider;
use crate::config::ServerConfig;
use crate::db::Database;
use crate::email::Mailer;
use crate::events::EventBus;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Leads, agents, roles and visitor slots
    pub db: Database,
    /// Attribution policy, publishing to `events`
    pub tracker: AttributionTracker,
    /// Bearer-token verification for admin endpoints
    pub auth: Arc<dyn AuthProvider>,
    pub mailer: Arc<Mailer>,
    pub events: EventBus,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        db: Database,
        auth: Arc<dyn AuthProvider>,
        mailer: Arc<Mailer>,
        events: EventBus,
        config: ApiConfig,
    ) -> Self {
        Self {
            db,
            tracker: AttributionTracker::with_events(events.clone()),
            auth,
            mailer,
            events,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Leads included in the admin summary
    pub summary_recent_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ApiConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            cors_origins: server.cors_origins.clone(),
            max_body_size: server.max_body_size,
            summary_recent_limit: 25,
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
