//! Funnel Event Bus
//!
//! Publish/subscribe channel for things that happen in the funnel (visits
//! attributed, leads saved, emails sent, agents toggled). Consumers such as
//! the debug logger subscribe explicitly instead of hooking a shared global.
//! Uses a tokio broadcast channel, so slow consumers lag rather than block
//! publishers.

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::attribution::Channel;

/// Something that happened in the funnel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FunnelEvent {
    /// A landing visit was run through the attribution policy
    AttributionRecorded {
        visitor_id: String,
        channel: Channel,
        meaningful: bool,
        landing_page: String,
    },
    /// A lead was created or refreshed
    LeadSaved {
        lead_id: String,
        source_tool: String,
        channel: Channel,
        created: bool,
    },
    /// A notification email was handed to a transport
    EmailDispatched {
        to: String,
        email_type: String,
        simulated: bool,
    },
    /// An admin changed a call-dispatch agent
    CallAgentUpdated { agent_id: String, enabled: bool },
}

impl FunnelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FunnelEvent::AttributionRecorded { .. } => "attribution_recorded",
            FunnelEvent::LeadSaved { .. } => "lead_saved",
            FunnelEvent::EmailDispatched { .. } => "email_dispatched",
            FunnelEvent::CallAgentUpdated { .. } => "call_agent_updated",
        }
    }
}

/// Broadcast bus for funnel events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FunnelEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers that will see it;
    /// zero subscribers is not an error.
    pub fn publish(&self, event: FunnelEvent) -> usize {
        tracing::trace!(event = event.name(), "Publishing funnel event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FunnelEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Log every event at debug level until the bus is dropped
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    tracing::debug!(event = event.name(), payload = %payload, "Funnel event");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        let delivered = bus.publish(FunnelEvent::CallAgentUpdated {
            agent_id: "a1".to_string(),
            enabled: true,
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = FunnelEvent::EmailDispatched {
            to: "a@b.com".to_string(),
            email_type: "follow_up".to_string(),
            simulated: true,
        };
        assert_eq!(bus.publish(event.clone()), 2);

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[test]
    fn test_event_serialization() {
        let event = FunnelEvent::LeadSaved {
            lead_id: "l1".to_string(),
            source_tool: "quote_builder".to_string(),
            channel: Channel::GoogleAds,
            created: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "lead_saved");
        assert_eq!(json["channel"], "google_ads");
    }
}
