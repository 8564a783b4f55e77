//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! Field names are camelCase on the wire to match the site's fetch calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::{CallAgent, CallAgentUpdate};
use crate::attribution::{Channel, ResolvedAttribution, SlotChanges, ThreeSlotState};
use crate::leads::LeadSummary;

// ============================================
// LEAD DTOs
// ============================================

/// Response to `save-lead`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLeadResponse {
    pub success: bool,
    pub lead_id: String,
    /// False when an existing lead with the same email was refreshed
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct LeadSummaryResponse {
    pub success: bool,
    pub summary: LeadSummary,
}

// ============================================
// CALL AGENT DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct AgentListResponse {
    pub success: bool,
    pub agents: Vec<CallAgent>,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub success: bool,
    pub agent: CallAgent,
}

/// PATCH body: flip one agent on or off
#[derive(Debug, Deserialize)]
pub struct SetAgentEnabledRequest {
    pub id: String,
    pub enabled: bool,
}

/// PUT body: partial update of one agent
#[derive(Debug, Deserialize)]
pub struct UpdateAgentRequest {
    pub id: String,
    #[serde(flatten)]
    pub changes: CallAgentUpdate,
}

// ============================================
// EMAIL DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    /// Recipient
    pub email: String,
    /// Template name, e.g. `quote_request_received`
    #[serde(rename = "type")]
    pub email_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendEmailResponse {
    pub success: bool,
    pub simulated: bool,
    pub id: Option<String>,
}

// ============================================
// ATTRIBUTION DTOs
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVisitRequest {
    pub visitor_id: String,
    /// Full landing URL, or a path with query string
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVisitResponse {
    pub success: bool,
    pub channel: Channel,
    pub meaningful: bool,
    pub changes: SlotChanges,
    pub attribution: ResolvedAttribution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorAttributionResponse {
    pub visitor_id: String,
    /// True when nothing has been recorded for this visitor
    pub empty: bool,
    pub attribution: ResolvedAttribution,
    /// Slots as stored, without direct fallbacks
    pub stored: ThreeSlotState,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    pub database: String,
    /// "live" or "simulated"
    pub email: String,
    pub uptime_seconds: u64,
    pub version: String,
}
