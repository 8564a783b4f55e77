//! Lead Routes
//!
//! - POST /functions/v1/save-lead - Capture a lead from a site tool
//! - GET /functions/v1/admin-lead-summary - Channel/source breakdown (admin)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::dto::{LeadSummaryResponse, SaveLeadResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::attribution::ThreeSlotState;
use crate::auth::require_admin;
use crate::email::EmailType;
use crate::events::FunnelEvent;
use crate::leads::{Lead, NewLead, ValidLead};

/// POST /functions/v1/save-lead
///
/// Validate and upsert a lead by email. Attribution comes from the body when
/// present, else from the visitor's stored slots, else defaults to direct.
pub async fn save_lead(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewLead>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SaveLeadResponse>)> {
    let Json(req) = payload?;
    let lead = req.validate()?;

    let attribution = resolve_attribution(&state, &lead).await?;
    let outcome = state.db.save_lead(lead, attribution).await?;

    tracing::info!(
        lead_id = %outcome.lead.id,
        source_tool = %outcome.lead.source_tool,
        channel = %outcome.lead.channel,
        created = outcome.created,
        "Lead saved"
    );

    state.events.publish(FunnelEvent::LeadSaved {
        lead_id: outcome.lead.id.clone(),
        source_tool: outcome.lead.source_tool.clone(),
        channel: outcome.lead.channel,
        created: outcome.created,
    });

    spawn_new_lead_alert(&state, &outcome.lead);

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(SaveLeadResponse {
            success: true,
            lead_id: outcome.lead.id,
            created: outcome.created,
        }),
    ))
}

/// GET /functions/v1/admin-lead-summary
pub async fn lead_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<LeadSummaryResponse>> {
    require_admin(state.auth.as_ref(), &state.db, &headers).await?;

    let summary = state
        .db
        .lead_summary(state.config.summary_recent_limit)
        .await?;

    Ok(Json(LeadSummaryResponse {
        success: true,
        summary,
    }))
}

async fn resolve_attribution(state: &AppState, lead: &ValidLead) -> ApiResult<ThreeSlotState> {
    if let Some(attribution) = lead.attribution.as_ref().filter(|a| !a.is_empty()) {
        return Ok(attribution.clone());
    }

    match &lead.visitor_id {
        Some(visitor_id) => Ok(state.db.visitor_attribution(visitor_id).await?),
        None => Ok(ThreeSlotState::default()),
    }
}

/// Alert the sales inbox in the background; failures never reach the caller
fn spawn_new_lead_alert(state: &AppState, lead: &Lead) {
    let Some(to) = state.mailer.notify_address().map(str::to_string) else {
        return;
    };

    let mailer = Arc::clone(&state.mailer);
    let data = alert_data(lead);
    let lead_id = lead.id.clone();

    tokio::spawn(async move {
        if let Err(e) = mailer.send(&to, EmailType::NewLeadAlert, &data).await {
            tracing::warn!(lead_id = %lead_id, error = %e, "New lead alert failed");
        }
    });
}

fn alert_data(lead: &Lead) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("email".into(), Value::String(lead.email.clone()));
    data.insert("sourceTool".into(), Value::String(lead.source_tool.clone()));
    data.insert("channel".into(), Value::String(lead.channel.to_string()));
    data.insert(
        "landingPage".into(),
        Value::String(lead.last_non_direct.landing_page.clone()),
    );
    if let Some(name) = &lead.name {
        data.insert("name".into(), Value::String(name.clone()));
    }
    if let Some(phone) = &lead.phone {
        data.insert("phone".into(), Value::String(phone.clone()));
    }
    data
}
