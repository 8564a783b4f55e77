//! Three-slot attribution state
//!
//! The write policy is a pure function over the current state and the
//! incoming visit, so it can be exercised without any storage behind it:
//!
//! | slot              | written when                          |
//! |-------------------|---------------------------------------|
//! | `first_touch`     | slot is empty (write-once)            |
//! | `last_touch`      | every visit, direct included          |
//! | `last_non_direct` | visit is a meaningful touch (merged)  |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::params::{LandingPage, VisitParams};
use super::snapshot::AttributionSnapshot;
use super::touch::is_meaningful_touch;

/// Stored attribution for one visitor; any slot may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeSlotState {
    pub first_touch: Option<AttributionSnapshot>,
    pub last_touch: Option<AttributionSnapshot>,
    pub last_non_direct: Option<AttributionSnapshot>,
}

/// Which slots a visit changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotChanges {
    pub first_touch: bool,
    pub last_touch: bool,
    pub last_non_direct: bool,
}

/// Result of applying one visit to the state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionUpdate {
    pub state: ThreeSlotState,
    pub candidate: AttributionSnapshot,
    pub channel: Channel,
    pub meaningful: bool,
    pub changes: SlotChanges,
}

/// Apply the three-slot write policy for a single visit
pub fn update_attribution(
    existing: ThreeSlotState,
    params: &VisitParams,
    landing: &LandingPage,
    now: DateTime<Utc>,
) -> AttributionUpdate {
    let candidate = AttributionSnapshot::capture(params, landing, now);
    let meaningful = is_meaningful_touch(params);
    let mut changes = SlotChanges::default();

    let ThreeSlotState {
        first_touch,
        last_non_direct,
        ..
    } = existing;

    let first_touch = match first_touch {
        Some(first) => Some(first),
        None => {
            changes.first_touch = true;
            Some(candidate.clone())
        }
    };

    changes.last_touch = true;
    let last_touch = Some(candidate.clone());

    let last_non_direct = if meaningful {
        changes.last_non_direct = true;
        match last_non_direct {
            Some(mut previous) => {
                previous.merge_from(&candidate);
                Some(previous)
            }
            None => Some(candidate.clone()),
        }
    } else {
        last_non_direct
    };

    AttributionUpdate {
        channel: candidate.channel,
        state: ThreeSlotState {
            first_touch,
            last_touch,
            last_non_direct,
        },
        candidate,
        meaningful,
        changes,
    }
}

/// Attribution with every slot filled in; missing slots become `direct`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAttribution {
    pub first_touch: AttributionSnapshot,
    pub last_touch: AttributionSnapshot,
    pub last_non_direct: AttributionSnapshot,
}

impl ThreeSlotState {
    pub fn is_empty(&self) -> bool {
        self.first_touch.is_none() && self.last_touch.is_none() && self.last_non_direct.is_none()
    }

    pub fn resolved(&self) -> ResolvedAttribution {
        let fallback = || AttributionSnapshot::direct("/", None);
        ResolvedAttribution {
            first_touch: self.first_touch.clone().unwrap_or_else(fallback),
            last_touch: self.last_touch.clone().unwrap_or_else(fallback),
            last_non_direct: self.last_non_direct.clone().unwrap_or_else(fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn visit(state: ThreeSlotState, url: &str, minutes: i64) -> AttributionUpdate {
        let landing = LandingPage::parse(url);
        update_attribution(state, &landing.params(), &landing, t(minutes))
    }

    fn replay(urls: &[&str]) -> ThreeSlotState {
        urls.iter()
            .enumerate()
            .fold(ThreeSlotState::default(), |state, (i, url)| {
                visit(state, url, i as i64).state
            })
    }

    #[test]
    fn test_first_visit_fills_first_and_last() {
        let update = visit(ThreeSlotState::default(), "/", 0);
        assert!(update.changes.first_touch);
        assert!(update.changes.last_touch);
        assert!(!update.changes.last_non_direct);
        assert_eq!(update.state.first_touch.unwrap().channel, Channel::Direct);
        assert!(update.state.last_non_direct.is_none());
    }

    #[test]
    fn test_first_touch_is_immutable() {
        let after_first = replay(&["/?gclid=abc"]);
        let after_many = replay(&[
            "/?gclid=abc",
            "/?fbclid=def",
            "/",
            "/?utm_source=news&utm_medium=email",
            "/?msclkid=zzz",
        ]);
        assert_eq!(after_first.first_touch, after_many.first_touch);
    }

    #[test]
    fn test_last_touch_tracks_every_visit() {
        let urls = ["/?gclid=abc", "/", "/?utm_source=google&utm_medium=organic", "/"];
        let mut state = ThreeSlotState::default();
        for (i, url) in urls.iter().enumerate() {
            let landing = LandingPage::parse(url);
            let expected = crate::attribution::classify(&landing.params());
            state = visit(state, url, i as i64).state;
            assert_eq!(state.last_touch.as_ref().unwrap().channel, expected);
        }
        assert_eq!(state.last_touch.unwrap().channel, Channel::Direct);
    }

    #[test]
    fn test_direct_visits_protect_last_non_direct() {
        let v1 = replay(&["/?gclid=abc"]);
        let after = replay(&["/?gclid=abc", "/", "/about", "/?ref=nav"]);
        assert_eq!(v1.last_non_direct, after.last_non_direct);
        assert_eq!(after.last_non_direct.unwrap().channel, Channel::GoogleAds);
    }

    #[test]
    fn test_new_meaningful_touch_updates_last_non_direct() {
        let state = replay(&["/?gclid=abc", "/", "/?fbclid=xyz"]);
        let lnd = state.last_non_direct.unwrap();
        assert_eq!(lnd.channel, Channel::MetaAds);
        assert_eq!(lnd.fbclid(), Some("xyz"));
        // Residual click ID from the earlier merge is tolerated
        assert_eq!(lnd.gclid.as_deref(), Some("abc"));
    }

    #[test]
    fn test_meaningfulness_boundary() {
        let base = replay(&["/?gclid=abc"]);

        let source_only = visit(base.clone(), "/?utm_source=partner", 5);
        assert!(!source_only.meaningful);
        assert_eq!(source_only.state.last_non_direct, base.last_non_direct);
        assert_eq!(source_only.state.last_touch.unwrap().channel, Channel::Other);

        let source_and_medium = visit(base.clone(), "/?utm_source=news&utm_medium=email", 5);
        assert!(source_and_medium.meaningful);
        assert_eq!(
            source_and_medium.state.last_non_direct.unwrap().channel,
            Channel::Email
        );
    }

    #[test]
    fn test_resolved_defaults_to_direct() {
        let resolved = ThreeSlotState::default().resolved();
        assert_eq!(resolved.first_touch.channel, Channel::Direct);
        assert_eq!(resolved.last_touch.channel, Channel::Direct);
        assert_eq!(resolved.last_non_direct.channel, Channel::Direct);
        assert!(ThreeSlotState::default().is_empty());
    }
}
