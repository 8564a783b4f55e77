//! Email transports
//!
//! `ResendTransport` talks to the Resend HTTP API. `SimulatedTransport` only
//! logs, which keeps environments without an API key working.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmailError, RenderedEmail};

/// A message addressed and rendered
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub content: RenderedEmail,
}

/// What the transport reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub provider_id: Option<String>,
    pub simulated: bool,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<Delivery, EmailError>;

    fn is_simulated(&self) -> bool {
        false
    }
}

// ============================================
// Resend
// ============================================

pub struct ResendTransport {
    client: Client,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

impl ResendTransport {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self, EmailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EmailError::Request)?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl EmailTransport for ResendTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<Delivery, EmailError> {
        let url = format!("{}/emails", self.api_base);

        let body = ResendRequest {
            from: &email.from,
            to: [email.to.as_str()],
            subject: &email.content.subject,
            html: &email.content.html,
            text: &email.content.text,
            reply_to: email.reply_to.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmailError::Timeout
                } else {
                    EmailError::Request(e)
                }
            })?;

        if response.status().is_success() {
            let parsed: ResendResponse = response.json().await.map_err(EmailError::Request)?;
            Ok(Delivery {
                provider_id: parsed.id,
                simulated: false,
            })
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(EmailError::Provider {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

// ============================================
// Simulation
// ============================================

/// Logs messages instead of sending them
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport;

#[async_trait]
impl EmailTransport for SimulatedTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<Delivery, EmailError> {
        let id = format!("simulated-{}", uuid::Uuid::new_v4());

        tracing::info!(
            id = %id,
            from = %email.from,
            to = %email.to,
            subject = %email.content.subject,
            "Simulation mode: email not sent (no API key configured)"
        );
        tracing::debug!(body = %email.content.text, "Simulated email body");

        Ok(Delivery {
            provider_id: Some(id),
            simulated: true,
        })
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outgoing() -> OutgoingEmail {
        OutgoingEmail {
            from: "Window Man <noreply@example.com>".to_string(),
            to: "jane@example.com".to_string(),
            reply_to: None,
            content: RenderedEmail {
                subject: "Hello".to_string(),
                html: "<p>Hello</p>".to_string(),
                text: "Hello".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_simulated_send() {
        let transport = SimulatedTransport;
        let delivery = transport.send(&outgoing()).await.unwrap();
        assert!(delivery.simulated);
        assert!(delivery.provider_id.unwrap().starts_with("simulated-"));
        assert!(transport.is_simulated());
    }

    #[test]
    fn test_resend_request_shape() {
        let email = outgoing();
        let body = ResendRequest {
            from: &email.from,
            to: [email.to.as_str()],
            subject: &email.content.subject,
            html: &email.content.html,
            text: &email.content.text,
            reply_to: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"], serde_json::json!(["jane@example.com"]));
        assert!(json.get("reply_to").is_none());
    }

    #[tokio::test]
    async fn test_resend_unreachable() {
        let transport =
            ResendTransport::new("http://127.0.0.1:1", "key", Duration::from_millis(200)).unwrap();
        assert!(transport.send(&outgoing()).await.is_err());
        assert!(!transport.is_simulated());
    }
}
