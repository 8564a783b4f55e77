//! Email Routes
//!
//! - POST /functions/v1/send-email-notification - Render and send a template

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{SendEmailRequest, SendEmailResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::email::EmailType;
use crate::leads::normalize_email;

/// POST /functions/v1/send-email-notification
///
/// Without an email API key the message is logged and reported as simulated.
pub async fn send_notification(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> ApiResult<Json<SendEmailResponse>> {
    let Json(req) = payload?;

    let to = normalize_email(&req.email)?;
    let email_type: EmailType = req.email_type.trim().parse()?;

    let receipt = state.mailer.send(&to, email_type, &req.data).await?;

    Ok(Json(SendEmailResponse {
        success: true,
        simulated: receipt.simulated,
        id: receipt.id,
    }))
}
