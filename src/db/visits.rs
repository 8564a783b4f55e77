//! Server-side attribution slots, one set per visitor

use crate::attribution::{
    load_state, AttributionTracker, AttributionUpdate, SqliteSlotStore, ThreeSlotState,
};

use super::{Database, DbResult};

impl Database {
    /// Apply a landing visit to the visitor's stored slots in one transaction
    pub async fn record_visit(
        &self,
        tracker: &AttributionTracker,
        visitor_id: &str,
        landing_url: &str,
    ) -> DbResult<AttributionUpdate> {
        let tracker = tracker.clone();
        let visitor_id = visitor_id.to_string();
        let landing_url = landing_url.to_string();

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let update = {
                let store = SqliteSlotStore::new(&tx, &visitor_id);
                tracker.record_visit(&store, &visitor_id, &landing_url)?
            };
            tx.commit()?;
            Ok(update)
        })
        .await
    }

    /// Current slots for a visitor; corrupt slots read as absent
    pub async fn visitor_attribution(&self, visitor_id: &str) -> DbResult<ThreeSlotState> {
        let visitor_id = visitor_id.to_string();

        self.execute(move |conn| {
            let store = SqliteSlotStore::new(conn, &visitor_id);
            Ok(load_state(&store))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{Channel, SlotStore, LAST_TOUCH_KEY};

    #[tokio::test]
    async fn test_visits_persist_per_visitor() {
        let db = Database::open_in_memory().unwrap();
        let tracker = AttributionTracker::new();

        db.record_visit(&tracker, "alice", "/?gclid=g").await.unwrap();
        db.record_visit(&tracker, "alice", "/").await.unwrap();
        db.record_visit(&tracker, "bob", "/?utm_source=news&utm_medium=email")
            .await
            .unwrap();

        let alice = db.visitor_attribution("alice").await.unwrap();
        assert_eq!(alice.first_touch.unwrap().channel, Channel::GoogleAds);
        assert_eq!(alice.last_touch.unwrap().channel, Channel::Direct);
        assert_eq!(alice.last_non_direct.unwrap().channel, Channel::GoogleAds);

        let bob = db.visitor_attribution("bob").await.unwrap();
        assert_eq!(bob.last_non_direct.unwrap().channel, Channel::Email);

        assert!(db.visitor_attribution("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_slot_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.execute(|conn| {
            SqliteSlotStore::new(conn, "v").set_raw(LAST_TOUCH_KEY, "not-valid-json")?;
            Ok(())
        })
        .await
        .unwrap();

        assert!(db.visitor_attribution("v").await.unwrap().last_touch.is_none());

        let update = db
            .record_visit(&AttributionTracker::new(), "v", "/?fbclid=f")
            .await
            .unwrap();
        assert_eq!(update.channel, Channel::MetaAds);
    }
}
