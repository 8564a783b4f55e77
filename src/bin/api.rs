//! WM Funnel API Server
//!
//! Run with: cargo run --bin wm-funnel-api [-- --config path/to/config.toml]
//!
//! # Configuration
//!
//! Read from a TOML file (see `wm-funnel init-config`), then overridden by
//! environment variables:
//! - `WM_HOST`, `WM_PORT`: Bind address (default: 0.0.0.0:8787)
//! - `WM_DATABASE_PATH`: SQLite database file
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY`: Hosted auth service for admin tokens
//! - `RESEND_API_KEY`: Email API key (unset = simulation mode)
//! - `WM_EMAIL_FROM`, `WM_NOTIFY_EMAIL`: Sender and new-lead alert inbox
//! - `WM_LOG_LEVEL`, `WM_LOG_FORMAT`: Logging (`RUST_LOG` wins when set)

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use wm_funnel::api::{serve, ApiConfig, AppState};
use wm_funnel::auth::{AuthProvider, StaticTokenAuth, SupabaseAuth};
use wm_funnel::config::{AuthConfig, Config};
use wm_funnel::db::Database;
use wm_funnel::email::Mailer;
use wm_funnel::events::{spawn_event_logger, EventBus};
use wm_funnel::logging::init_logging;

#[derive(Parser)]
#[command(name = "wm-funnel-api")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lead funnel API server")]
struct Args {
    /// Config file (default: standard locations, then environment)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::resolve(args.config.as_deref()).context("Failed to load config")?;
    init_logging(&config.logging);

    tracing::info!("Starting WM Funnel API server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {}", config.database.path);

    let db = Database::open(Path::new(&config.database.path))
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;

    let events = EventBus::default();
    let _event_logger = spawn_event_logger(&events);

    let auth = build_auth(&config.auth)?;

    let mailer = Mailer::from_config(&config.email)
        .context("Failed to initialise email transport")?
        .with_db(db.clone())
        .with_events(events.clone());
    if mailer.is_simulated() {
        tracing::info!("Email: simulation mode (set RESEND_API_KEY to send)");
    }
    if let Some(notify) = mailer.notify_address() {
        tracing::info!("New lead alerts go to {}", notify);
    }

    let api_config = ApiConfig::from(&config.server);
    let state = AppState::new(db, auth, Arc::new(mailer), events, api_config);

    serve(state).await?;

    tracing::info!("WM Funnel API server stopped");
    Ok(())
}

/// Hosted auth service when configured, otherwise the static token table
fn build_auth(config: &AuthConfig) -> anyhow::Result<Arc<dyn AuthProvider>> {
    match config.supabase_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let anon_key = config
                .supabase_anon_key
                .as_deref()
                .context("SUPABASE_ANON_KEY is required when SUPABASE_URL is set")?;

            tracing::info!("Admin auth: hosted service at {}", url);
            let auth = SupabaseAuth::new(url, anon_key, Duration::from_secs(config.timeout_secs))?;
            Ok(Arc::new(auth))
        }
        _ => {
            if config.static_tokens.is_empty() {
                tracing::warn!("No auth service or static tokens configured; admin endpoints will reject every request");
            } else {
                tracing::info!("Admin auth: {} static token(s)", config.static_tokens.len());
            }
            Ok(Arc::new(StaticTokenAuth::new(config.static_tokens.clone())))
        }
    }
}
