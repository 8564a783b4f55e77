//! Funnel HTTP API
//!
//! HTTP layer built with Axum. Paths under `/functions/v1` keep the names
//! the site already calls.
//!
//! # Endpoints
//!
//! ## Leads
//! - `POST /functions/v1/save-lead` - Capture a lead
//! - `GET /functions/v1/admin-lead-summary` - Channel/source breakdown (admin)
//!
//! ## Call agents (admin)
//! - `GET|POST|PATCH|PUT /functions/v1/admin-update-call-agent`
//!
//! ## Email
//! - `POST /functions/v1/send-email-notification` - Send a templated email
//!
//! ## Attribution
//! - `POST /api/v1/attribution/visit` - Record a landing visit
//! - `GET /api/v1/attribution/visitors/:visitor_id` - Read a visitor's slots
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let function_routes = Router::new()
        .route("/save-lead", post(routes::leads::save_lead))
        .route("/admin-lead-summary", get(routes::leads::lead_summary))
        .route(
            "/admin-update-call-agent",
            get(routes::agents::list_agents)
                .post(routes::agents::create_agent)
                .patch(routes::agents::set_agent_enabled)
                .put(routes::agents::update_agent),
        )
        .route(
            "/send-email-notification",
            post(routes::email::send_notification),
        );

    let api_routes = Router::new()
        .route("/attribution/visit", post(routes::attribution::record_visit))
        .route(
            "/attribution/visitors/:visitor_id",
            get(routes::attribution::get_attribution),
        );

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = state.config.max_body_size;

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/functions/v1", function_routes)
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Funnel API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Funnel API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
