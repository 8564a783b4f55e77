//! Marketing Attribution
//!
//! Classifies landing visits into channels and maintains three attribution
//! slots per visitor:
//!
//! - **first_touch** (`wm_first_touch`): written once, never overwritten
//! - **last_touch** (`wm_attribution_data`): overwritten on every visit
//! - **last_non_direct** (`wm_last_non_direct`): updated only by meaningful touches
//!
//! # Flow
//!
//! ```text
//! landing URL ─→ LandingPage ─→ VisitParams ─→ classify() ─→ AttributionSnapshot
//!                                    │
//!                                    └─→ is_meaningful_touch()
//!                                                │
//! SlotStore ─→ load_state() ─→ update_attribution() ─→ save_state() ─→ SlotStore
//! ```

mod channel;
mod params;
mod snapshot;
mod state;
pub mod store;
mod touch;
mod tracker;

pub use channel::{classify, Channel};
pub use params::{LandingPage, VisitParams};
pub use snapshot::{fbc_from_fbclid, AttributionSnapshot};
pub use state::{
    update_attribution, AttributionUpdate, ResolvedAttribution, SlotChanges, ThreeSlotState,
};
pub use store::{
    load_state, read_slot, save_state, MemorySlotStore, SlotStore, SqliteSlotStore, StoreError,
    StoreResult, FIRST_TOUCH_KEY, LAST_NON_DIRECT_KEY, LAST_TOUCH_KEY,
};
pub use touch::is_meaningful_touch;
pub use tracker::AttributionTracker;
