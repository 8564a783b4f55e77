//! Attribution Snapshot
//!
//! Flat record of one landing visit's marketing context. Serialized as JSON
//! into the attribution slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::{classify, Channel};
use super::params::{LandingPage, VisitParams};

/// Attribution data captured for a single visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    /// Meta click cookie value derived from `fbclid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msclkid: Option<String>,
    pub channel: Channel,
    pub landing_page: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl AttributionSnapshot {
    /// Build the candidate snapshot for a visit
    pub fn capture(params: &VisitParams, landing: &LandingPage, now: DateTime<Utc>) -> Self {
        Self {
            utm_source: params.utm_source.clone(),
            utm_medium: params.utm_medium.clone(),
            utm_campaign: params.utm_campaign.clone(),
            gclid: params.gclid.clone(),
            fbc: params.fbclid.as_deref().map(|id| fbc_from_fbclid(id, now)),
            msclkid: params.msclkid.clone(),
            channel: classify(params),
            landing_page: landing.to_landing_string(),
            captured_at: Some(now),
        }
    }

    /// Safe default record used when a slot is absent or unreadable
    pub fn direct(landing_page: impl Into<String>, now: Option<DateTime<Utc>>) -> Self {
        Self {
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            gclid: None,
            fbc: None,
            msclkid: None,
            channel: Channel::Direct,
            landing_page: landing_page.into(),
            captured_at: now,
        }
    }

    /// Overlay a newer snapshot onto this one.
    ///
    /// Fields the newer snapshot supplies replace ours; fields it leaves empty
    /// keep their previous value. Channel, landing page and capture time always
    /// follow the newer snapshot.
    pub fn merge_from(&mut self, newer: &AttributionSnapshot) {
        overlay(&mut self.utm_source, &newer.utm_source);
        overlay(&mut self.utm_medium, &newer.utm_medium);
        overlay(&mut self.utm_campaign, &newer.utm_campaign);
        overlay(&mut self.gclid, &newer.gclid);
        overlay(&mut self.fbc, &newer.fbc);
        overlay(&mut self.msclkid, &newer.msclkid);
        self.channel = newer.channel;
        self.landing_page = newer.landing_page.clone();
        self.captured_at = newer.captured_at;
    }

    /// The raw `fbclid` embedded in `fbc`, if any
    pub fn fbclid(&self) -> Option<&str> {
        self.fbc.as_deref().and_then(|fbc| fbc.splitn(4, '.').nth(3))
    }
}

/// Format a click ID the way Meta's `_fbc` cookie does: `fb.1.<ms>.<fbclid>`
pub fn fbc_from_fbclid(fbclid: &str, now: DateTime<Utc>) -> String {
    format!("fb.1.{}.{}", now.timestamp_millis(), fbclid)
}

fn overlay(target: &mut Option<String>, newer: &Option<String>) {
    if let Some(value) = newer {
        *target = Some(value.clone());
    }
}
