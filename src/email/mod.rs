//! Email Notifications
//!
//! Templated transactional email. The [`Mailer`] renders a template for an
//! [`EmailType`], hands it to a transport and records the attempt in
//! `email_log`. Without an API key the mailer runs in simulation mode and
//! only logs what it would have sent.

mod templates;
mod transport;

pub use templates::{escape_html, render, RenderedEmail};
pub use transport::{
    Delivery, EmailTransport, OutgoingEmail, ResendTransport, SimulatedTransport,
};

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::db::Database;
use crate::events::{EventBus, FunnelEvent};

/// Notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    /// Internal alert to the sales inbox
    NewLeadAlert,
    QuoteRequestReceived,
    ConsultationScheduled,
    EstimateReady,
    FollowUp,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::NewLeadAlert => "new_lead_alert",
            EmailType::QuoteRequestReceived => "quote_request_received",
            EmailType::ConsultationScheduled => "consultation_scheduled",
            EmailType::EstimateReady => "estimate_ready",
            EmailType::FollowUp => "follow_up",
        }
    }

    pub fn all() -> &'static [EmailType] {
        &[
            EmailType::NewLeadAlert,
            EmailType::QuoteRequestReceived,
            EmailType::ConsultationScheduled,
            EmailType::EstimateReady,
            EmailType::FollowUp,
        ]
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmailType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EmailError::UnknownType(s.to_string()))
    }
}

/// Errors from rendering or sending email
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Unknown email type: {0}")]
    UnknownType(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Email provider error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Email provider timeout")]
    Timeout,
}

/// Result of a send, as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub id: Option<String>,
    pub simulated: bool,
}

/// Renders, sends and logs notification email
pub struct Mailer {
    transport: Arc<dyn EmailTransport>,
    from: String,
    reply_to: Option<String>,
    notify_address: Option<String>,
    db: Option<Database>,
    events: Option<EventBus>,
}

impl Mailer {
    pub fn new(transport: Arc<dyn EmailTransport>, from: impl Into<String>) -> Self {
        Self {
            transport,
            from: from.into(),
            reply_to: None,
            notify_address: None,
            db: None,
            events: None,
        }
    }

    /// Build from configuration: Resend when an API key is set, simulation otherwise
    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        let transport: Arc<dyn EmailTransport> = match config.resend_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Arc::new(ResendTransport::new(
                &config.api_base,
                key.trim(),
                Duration::from_secs(config.timeout_secs),
            )?),
            _ => {
                tracing::warn!("No email API key configured, running in simulation mode");
                Arc::new(SimulatedTransport)
            }
        };

        let mut mailer = Self::new(transport, config.from.clone())
            .with_notify_address(config.notify_address.clone());
        mailer.reply_to = config.reply_to.clone();
        Ok(mailer)
    }

    pub fn with_db(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_notify_address(mut self, address: Option<String>) -> Self {
        self.notify_address = address;
        self
    }

    pub fn is_simulated(&self) -> bool {
        self.transport.is_simulated()
    }

    /// Inbox that receives internal new-lead alerts, if any
    pub fn notify_address(&self) -> Option<&str> {
        self.notify_address.as_deref()
    }

    pub async fn send(
        &self,
        to: &str,
        email_type: EmailType,
        data: &Map<String, Value>,
    ) -> Result<SendReceipt, EmailError> {
        let outgoing = OutgoingEmail {
            from: self.from.clone(),
            to: to.to_string(),
            reply_to: self.reply_to.clone(),
            content: render(email_type, data),
        };

        let result = self.transport.send(&outgoing).await;

        match &result {
            Ok(delivery) => tracing::info!(
                to = %to,
                email_type = %email_type,
                simulated = delivery.simulated,
                "Email dispatched"
            ),
            Err(e) => tracing::error!(
                to = %to,
                email_type = %email_type,
                error = %e,
                "Email dispatch failed"
            ),
        }

        self.log_attempt(&outgoing, email_type, &result).await;

        let delivery = result?;

        if let Some(events) = &self.events {
            events.publish(FunnelEvent::EmailDispatched {
                to: to.to_string(),
                email_type: email_type.to_string(),
                simulated: delivery.simulated,
            });
        }

        Ok(SendReceipt {
            id: delivery.provider_id,
            simulated: delivery.simulated,
        })
    }

    async fn log_attempt(
        &self,
        outgoing: &OutgoingEmail,
        email_type: EmailType,
        result: &Result<Delivery, EmailError>,
    ) {
        let Some(db) = &self.db else {
            return;
        };

        let recipient = outgoing.to.clone();
        let subject = outgoing.content.subject.clone();
        let (provider_id, simulated, error) = match result {
            Ok(d) => (d.provider_id.clone(), d.simulated, None),
            Err(e) => (None, self.is_simulated(), Some(e.to_string())),
        };

        let logged = db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO email_log
                        (id, recipient, email_type, subject, provider_id, simulated, error, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        recipient,
                        email_type.as_str(),
                        subject,
                        provider_id,
                        simulated,
                        error,
                        crate::db::timestamp(Utc::now()),
                    ],
                )?;
                Ok(())
            })
            .await;

        if let Err(e) = logged {
            tracing::warn!(error = %e, "Failed to record email in log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingTransport;

    #[async_trait]
    impl EmailTransport for FailingTransport {
        async fn send(&self, _email: &OutgoingEmail) -> Result<Delivery, EmailError> {
            Err(EmailError::Provider {
                status: 422,
                message: "invalid from".to_string(),
            })
        }
    }

    async fn count_log(db: &Database) -> i64 {
        db.execute(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM email_log", [], |row| row.get(0))?)
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_email_type_parsing() {
        assert_eq!(
            "estimate_ready".parse::<EmailType>().unwrap(),
            EmailType::EstimateReady
        );
        assert!(matches!(
            "newsletter".parse::<EmailType>(),
            Err(EmailError::UnknownType(_))
        ));
    }

    #[test]
    fn test_from_config_without_key_simulates() {
        let config = EmailConfig::default();
        let mailer = Mailer::from_config(&config).unwrap();
        assert!(mailer.is_simulated());
    }

    #[test]
    fn test_from_config_with_key_uses_resend() {
        let config = EmailConfig {
            resend_api_key: Some("re_test".to_string()),
            ..Default::default()
        };
        assert!(!Mailer::from_config(&config).unwrap().is_simulated());
    }

    #[tokio::test]
    async fn test_simulated_send_is_logged_and_published() {
        let db = Database::open_in_memory().unwrap();
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        let mailer = Mailer::new(Arc::new(SimulatedTransport), "noreply@example.com")
            .with_db(db.clone())
            .with_events(bus);

        let receipt = mailer
            .send(
                "jane@example.com",
                EmailType::QuoteRequestReceived,
                json!({"name": "Jane"}).as_object().unwrap(),
            )
            .await
            .unwrap();

        assert!(receipt.simulated);
        assert_eq!(count_log(&db).await, 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            FunnelEvent::EmailDispatched { simulated: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_send_is_logged() {
        let db = Database::open_in_memory().unwrap();
        let mailer =
            Mailer::new(Arc::new(FailingTransport), "noreply@example.com").with_db(db.clone());

        let err = mailer
            .send("jane@example.com", EmailType::FollowUp, &Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EmailError::Provider { status: 422, .. }));
        assert_eq!(count_log(&db).await, 1);
    }
}
