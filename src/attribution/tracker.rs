//! Attribution Tracker
//!
//! Runs the read-modify-write for a landing visit against a slot store and
//! announces the result on the event bus.

use chrono::{DateTime, Utc};

use super::params::LandingPage;
use super::state::{update_attribution, AttributionUpdate};
use super::store::{load_state, save_state, SlotStore, StoreResult};
use crate::events::{EventBus, FunnelEvent};

/// Applies the attribution policy on every page load
#[derive(Debug, Clone, Default)]
pub struct AttributionTracker {
    events: Option<EventBus>,
}

impl AttributionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventBus) -> Self {
        Self {
            events: Some(events),
        }
    }

    /// Record a visit to `landing_url` at the current time
    pub fn record_visit(
        &self,
        store: &dyn SlotStore,
        visitor_id: &str,
        landing_url: &str,
    ) -> StoreResult<AttributionUpdate> {
        self.record_visit_at(store, visitor_id, landing_url, Utc::now())
    }

    pub fn record_visit_at(
        &self,
        store: &dyn SlotStore,
        visitor_id: &str,
        landing_url: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<AttributionUpdate> {
        let landing = LandingPage::parse(landing_url);
        let params = landing.params();

        let existing = load_state(store);
        let update = update_attribution(existing, &params, &landing, now);
        save_state(store, &update.state, update.changes)?;

        tracing::debug!(
            visitor_id = %visitor_id,
            channel = %update.channel,
            meaningful = update.meaningful,
            first_touch_written = update.changes.first_touch,
            "Recorded attribution visit"
        );

        if let Some(events) = &self.events {
            events.publish(FunnelEvent::AttributionRecorded {
                visitor_id: visitor_id.to_string(),
                channel: update.channel,
                meaningful: update.meaningful,
                landing_page: update.candidate.landing_page.clone(),
            });
        }

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::store::{
        read_slot, MemorySlotStore, FIRST_TOUCH_KEY, LAST_NON_DIRECT_KEY, LAST_TOUCH_KEY,
    };
    use crate::attribution::Channel;

    fn channel_of(store: &MemorySlotStore, key: &str) -> Option<Channel> {
        read_slot(store, key).map(|s| s.channel)
    }

    #[test]
    fn test_google_then_direct() {
        let store = MemorySlotStore::new();
        let tracker = AttributionTracker::new();

        tracker.record_visit(&store, "v1", "https://example.com/?gclid=abc").unwrap();
        tracker.record_visit(&store, "v1", "https://example.com/").unwrap();

        assert_eq!(channel_of(&store, FIRST_TOUCH_KEY), Some(Channel::GoogleAds));
        assert_eq!(channel_of(&store, LAST_TOUCH_KEY), Some(Channel::Direct));
        assert_eq!(channel_of(&store, LAST_NON_DIRECT_KEY), Some(Channel::GoogleAds));
    }

    #[test]
    fn test_stored_slots_untouched_by_direct_visit() {
        let store = MemorySlotStore::new();
        let tracker = AttributionTracker::new();

        tracker.record_visit(&store, "v1", "/?fbclid=f1").unwrap();
        let before = store.get_raw(LAST_NON_DIRECT_KEY).unwrap();

        tracker.record_visit(&store, "v1", "/about").unwrap();
        tracker.record_visit(&store, "v1", "/?utm_source=yelp").unwrap();

        assert_eq!(store.get_raw(LAST_NON_DIRECT_KEY).unwrap(), before);
    }

    #[test]
    fn test_recovers_from_corrupt_slots() {
        let store = MemorySlotStore::new();
        for key in [FIRST_TOUCH_KEY, LAST_TOUCH_KEY, LAST_NON_DIRECT_KEY] {
            store.set_raw(key, "not-valid-json").unwrap();
        }

        let update = AttributionTracker::new()
            .record_visit(&store, "v1", "/")
            .unwrap();

        assert_eq!(update.channel, Channel::Direct);
        assert!(update.changes.first_touch);
        assert_eq!(channel_of(&store, FIRST_TOUCH_KEY), Some(Channel::Direct));
        // Not meaningful, so the corrupt slot is left as it was
        assert_eq!(
            store.get_raw(LAST_NON_DIRECT_KEY).unwrap().as_deref(),
            Some("not-valid-json")
        );
    }

    #[tokio::test]
    async fn test_publishes_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let store = MemorySlotStore::new();

        AttributionTracker::with_events(bus)
            .record_visit(&store, "visitor-9", "/?msclkid=m1")
            .unwrap();

        match rx.recv().await.unwrap() {
            FunnelEvent::AttributionRecorded {
                visitor_id,
                channel,
                meaningful,
                landing_page,
            } => {
                assert_eq!(visitor_id, "visitor-9");
                assert_eq!(channel, Channel::MicrosoftAds);
                assert!(meaningful);
                assert_eq!(landing_page, "/?msclkid=m1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
