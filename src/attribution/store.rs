//! Attribution slot storage
//!
//! Three string slots, keyed like the browser storage they mirror. Stores
//! hold raw strings; decoding happens here so that a corrupt slot is read as
//! absent instead of failing the visit.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use super::snapshot::AttributionSnapshot;
use super::state::{SlotChanges, ThreeSlotState};

/// Slot key for the write-once first touch
pub const FIRST_TOUCH_KEY: &str = "wm_first_touch";
/// Slot key for the most recent touch
pub const LAST_TOUCH_KEY: &str = "wm_attribution_data";
/// Slot key for the most recent meaningful touch
pub const LAST_NON_DIRECT_KEY: &str = "wm_last_non_direct";

/// Errors raised by a slot backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Slot backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key/value storage for attribution slots
pub trait SlotStore {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Read one slot, treating unreadable or malformed content as absent
pub fn read_slot(store: &dyn SlotStore, key: &str) -> Option<AttributionSnapshot> {
    let raw = match store.get_raw(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(slot = key, error = %e, "Failed to read attribution slot");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(slot = key, error = %e, "Ignoring malformed attribution slot");
            None
        }
    }
}

/// Load all three slots
pub fn load_state(store: &dyn SlotStore) -> ThreeSlotState {
    ThreeSlotState {
        first_touch: read_slot(store, FIRST_TOUCH_KEY),
        last_touch: read_slot(store, LAST_TOUCH_KEY),
        last_non_direct: read_slot(store, LAST_NON_DIRECT_KEY),
    }
}

/// Persist the slots flagged in `changes`
pub fn save_state(
    store: &dyn SlotStore,
    state: &ThreeSlotState,
    changes: SlotChanges,
) -> StoreResult<()> {
    let writes = [
        (changes.first_touch, FIRST_TOUCH_KEY, &state.first_touch),
        (changes.last_touch, LAST_TOUCH_KEY, &state.last_touch),
        (changes.last_non_direct, LAST_NON_DIRECT_KEY, &state.last_non_direct),
    ];

    for (changed, key, slot) in writes {
        if let (true, Some(snapshot)) = (changed, slot) {
            store.set_raw(key, &serde_json::to_string(snapshot)?)?;
        }
    }

    Ok(())
}

// ============================================
// In-memory store
// ============================================

/// Slots for a single browsing context, held in memory
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every slot, as clearing browser storage would
    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.write() {
            slots.clear();
        }
    }
}

impl SlotStore for MemorySlotStore {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let slots = self
            .slots
            .read()
            .map_err(|e| StoreError::Backend(format!("Lock poisoned: {}", e)))?;
        Ok(slots.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StoreError::Backend(format!("Lock poisoned: {}", e)))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================
// SQLite store
// ============================================

/// Slots for one visitor, stored in the `attribution_slots` table
pub struct SqliteSlotStore<'a> {
    conn: &'a Connection,
    visitor_id: &'a str,
}

impl<'a> SqliteSlotStore<'a> {
    pub fn new(conn: &'a Connection, visitor_id: &'a str) -> Self {
        Self { conn, visitor_id }
    }
}

impl SlotStore for SqliteSlotStore<'_> {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM attribution_slots WHERE visitor_id = ?1 AND slot_key = ?2",
                params![self.visitor_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO attribution_slots (visitor_id, slot_key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(visitor_id, slot_key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![self.visitor_id, key, value, crate::db::timestamp(Utc::now())],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::Channel;

    #[test]
    fn test_missing_slots_load_as_empty() {
        let store = MemorySlotStore::new();
        assert!(load_state(&store).is_empty());
    }

    #[test]
    fn test_malformed_json_reads_as_absent() {
        let store = MemorySlotStore::new();
        store.set_raw(FIRST_TOUCH_KEY, "not-valid-json").unwrap();
        store.set_raw(LAST_TOUCH_KEY, "{\"channel\":42}").unwrap();

        let state = load_state(&store);
        assert!(state.first_touch.is_none());
        assert!(state.last_touch.is_none());
        assert_eq!(state.resolved().first_touch.channel, Channel::Direct);
    }

    #[test]
    fn test_save_only_changed_slots() {
        let store = MemorySlotStore::new();
        let snap = AttributionSnapshot::direct("/", None);
        let state = ThreeSlotState {
            first_touch: Some(snap.clone()),
            last_touch: Some(snap.clone()),
            last_non_direct: Some(snap),
        };
        let changes = SlotChanges {
            first_touch: false,
            last_touch: true,
            last_non_direct: false,
        };

        save_state(&store, &state, changes).unwrap();

        assert!(store.get_raw(FIRST_TOUCH_KEY).unwrap().is_none());
        assert!(store.get_raw(LAST_TOUCH_KEY).unwrap().is_some());
        assert!(store.get_raw(LAST_NON_DIRECT_KEY).unwrap().is_none());
    }

    #[test]
    fn test_clear() {
        let store = MemorySlotStore::new();
        store.set_raw(LAST_TOUCH_KEY, "{}").unwrap();
        store.clear();
        assert!(store.get_raw(LAST_TOUCH_KEY).unwrap().is_none());
    }

    #[test]
    fn test_sqlite_slots_are_per_visitor() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(crate::db::migrations::SCHEMA_V1).unwrap();

        let alice = SqliteSlotStore::new(&conn, "alice");
        let bob = SqliteSlotStore::new(&conn, "bob");

        alice.set_raw(LAST_TOUCH_KEY, "a1").unwrap();
        alice.set_raw(LAST_TOUCH_KEY, "a2").unwrap();
        bob.set_raw(LAST_TOUCH_KEY, "b1").unwrap();

        assert_eq!(alice.get_raw(LAST_TOUCH_KEY).unwrap().as_deref(), Some("a2"));
        assert_eq!(bob.get_raw(LAST_TOUCH_KEY).unwrap().as_deref(), Some("b1"));
        assert!(bob.get_raw(FIRST_TOUCH_KEY).unwrap().is_none());
    }
}
