//! Attribution Routes
//!
//! Server-side counterpart of the browser tracker, keyed by visitor id.
//!
//! - POST /api/v1/attribution/visit - Apply a landing visit
//! - GET /api/v1/attribution/visitors/:visitor_id - Current slots

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{RecordVisitRequest, RecordVisitResponse, VisitorAttributionResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

const MAX_VISITOR_ID_LEN: usize = 128;

/// POST /api/v1/attribution/visit
pub async fn record_visit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecordVisitRequest>, JsonRejection>,
) -> ApiResult<Json<RecordVisitResponse>> {
    let Json(req) = payload?;
    let visitor_id = validate_visitor_id(&req.visitor_id)?;

    let update = state
        .db
        .record_visit(&state.tracker, visitor_id, &req.url)
        .await?;

    Ok(Json(RecordVisitResponse {
        success: true,
        channel: update.channel,
        meaningful: update.meaningful,
        changes: update.changes,
        attribution: update.state.resolved(),
    }))
}

/// GET /api/v1/attribution/visitors/:visitor_id
pub async fn get_attribution(
    State(state): State<Arc<AppState>>,
    Path(visitor_id): Path<String>,
) -> ApiResult<Json<VisitorAttributionResponse>> {
    let visitor_id = validate_visitor_id(&visitor_id)?;
    let stored = state.db.visitor_attribution(visitor_id).await?;

    Ok(Json(VisitorAttributionResponse {
        visitor_id: visitor_id.to_string(),
        empty: stored.is_empty(),
        attribution: stored.resolved(),
        stored,
    }))
}

fn validate_visitor_id(raw: &str) -> ApiResult<&str> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ApiError::Validation("visitorId is required".to_string()));
    }
    if id.len() > MAX_VISITOR_ID_LEN {
        return Err(ApiError::Validation(format!(
            "visitorId exceeds maximum length of {} characters",
            MAX_VISITOR_ID_LEN
        )));
    }
    Ok(id)
}
