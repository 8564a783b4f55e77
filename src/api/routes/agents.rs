//! Call Agent Routes
//!
//! `/functions/v1/admin-update-call-agent`, admin only. The HTTP method picks
//! the operation:
//!
//! - GET - List agents
//! - POST - Create an agent
//! - PATCH - Enable or disable an agent (`{ id, enabled }`)
//! - PUT - Update agent fields (`{ id, ...fields }`)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::agents::{CallAgent, NewCallAgent};
use crate::api::dto::{AgentListResponse, AgentResponse, SetAgentEnabledRequest, UpdateAgentRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::require_admin;
use crate::events::FunnelEvent;

/// GET /functions/v1/admin-update-call-agent
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<AgentListResponse>> {
    require_admin(state.auth.as_ref(), &state.db, &headers).await?;

    let agents = state.db.list_call_agents().await?;
    Ok(Json(AgentListResponse {
        success: true,
        agents,
    }))
}

/// POST /functions/v1/admin-update-call-agent
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewCallAgent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AgentResponse>)> {
    let admin = require_admin(state.auth.as_ref(), &state.db, &headers).await?;
    let Json(req) = payload?;
    let req = req.validate().map_err(ApiError::Validation)?;

    let agent = state.db.create_call_agent(req).await?;
    tracing::info!(admin = %admin.id, agent_id = %agent.agent_id, "Call agent created");
    announce(&state, &agent);

    Ok((
        StatusCode::CREATED,
        Json(AgentResponse {
            success: true,
            agent,
        }),
    ))
}

/// PATCH /functions/v1/admin-update-call-agent
pub async fn set_agent_enabled(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SetAgentEnabledRequest>, JsonRejection>,
) -> ApiResult<Json<AgentResponse>> {
    let admin = require_admin(state.auth.as_ref(), &state.db, &headers).await?;
    let Json(req) = payload?;
    let id = required_id(&req.id)?;

    let agent = state.db.set_call_agent_enabled(id, req.enabled).await?;
    tracing::info!(
        admin = %admin.id,
        agent_id = %agent.agent_id,
        enabled = agent.enabled,
        "Call agent toggled"
    );
    announce(&state, &agent);

    Ok(Json(AgentResponse {
        success: true,
        agent,
    }))
}

/// PUT /functions/v1/admin-update-call-agent
pub async fn update_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<UpdateAgentRequest>, JsonRejection>,
) -> ApiResult<Json<AgentResponse>> {
    let admin = require_admin(state.auth.as_ref(), &state.db, &headers).await?;
    let Json(req) = payload?;
    let id = required_id(&req.id)?;

    let changes = req.changes.validate().map_err(ApiError::Validation)?;
    if changes.is_empty() {
        return Err(ApiError::Validation("No fields to update".to_string()));
    }

    let agent = state.db.update_call_agent(id, changes).await?;
    tracing::info!(admin = %admin.id, agent_id = %agent.agent_id, "Call agent updated");
    announce(&state, &agent);

    Ok(Json(AgentResponse {
        success: true,
        agent,
    }))
}

fn required_id(id: &str) -> ApiResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::Validation("id is required".to_string()));
    }
    Ok(id)
}

fn announce(state: &AppState, agent: &CallAgent) {
    state.events.publish(FunnelEvent::CallAgentUpdated {
        agent_id: agent.agent_id.clone(),
        enabled: agent.enabled,
    });
}
