//! # WM Funnel
//!
//! Backend for a window-replacement lead funnel: marketing attribution,
//! lead capture, call-agent administration and templated notifications.
//!
//! ## Modules
//!
//! - [`attribution`]: Channel classification and the three-slot write policy
//! - [`leads`]: Lead validation and upsert-by-email storage
//! - [`agents`]: Call-dispatch agent administration
//! - [`auth`]: Bearer-token verification and the admin role check
//! - [`email`]: Notification templates and transports
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust
//! use wm_funnel::attribution::{AttributionTracker, Channel, MemorySlotStore};
//!
//! let store = MemorySlotStore::new();
//! let tracker = AttributionTracker::new();
//!
//! tracker.record_visit(&store, "visitor-1", "https://example.com/?gclid=abc").unwrap();
//! let update = tracker.record_visit(&store, "visitor-1", "https://example.com/pricing").unwrap();
//!
//! let slots = update.state.resolved();
//! assert_eq!(slots.first_touch.channel, Channel::GoogleAds);
//! assert_eq!(slots.last_touch.channel, Channel::Direct);
//! assert_eq!(slots.last_non_direct.channel, Channel::GoogleAds);
//! ```

pub mod agents;
pub mod api;
pub mod attribution;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod events;
pub mod leads;
pub mod logging;

// Re-export top-level types for convenience
pub use attribution::{
    classify, AttributionSnapshot, AttributionTracker, Channel, ResolvedAttribution,
    ThreeSlotState, VisitParams,
};

pub use agents::{CallAgent, CallAgentUpdate, NewCallAgent};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use auth::{AuthError, AuthProvider, AuthUser, StaticTokenAuth, SupabaseAuth};

pub use config::{Config, ConfigError, LoggingConfig};

pub use db::{Database, DbError, DbResult};

pub use email::{EmailError, EmailType, Mailer};

pub use events::{EventBus, FunnelEvent};

pub use leads::{Lead, LeadError, NewLead};
