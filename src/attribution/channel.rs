//! Channel Classifier
//!
//! Maps the parameters of a landing visit to a single marketing channel.
//! Checked in priority order, first match wins:
//!
//! 1. `gclid` → `google_ads`
//! 2. `fbclid` → `meta_ads`
//! 3. `msclkid` → `microsoft_ads`
//! 4. `utm_medium=email` → `email`
//! 5. `utm_medium=organic` → `organic_search`
//! 6. no parameters at all → `direct`
//! 7. anything else → `other`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::params::VisitParams;

/// Marketing channel label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    GoogleAds,
    MetaAds,
    MicrosoftAds,
    Email,
    OrganicSearch,
    Direct,
    Other,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::GoogleAds => "google_ads",
            Channel::MetaAds => "meta_ads",
            Channel::MicrosoftAds => "microsoft_ads",
            Channel::Email => "email",
            Channel::OrganicSearch => "organic_search",
            Channel::Direct => "direct",
            Channel::Other => "other",
        }
    }

    pub fn all() -> &'static [Channel] {
        &[
            Channel::GoogleAds,
            Channel::MetaAds,
            Channel::MicrosoftAds,
            Channel::Email,
            Channel::OrganicSearch,
            Channel::Direct,
            Channel::Other,
        ]
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown channel: {}", s))
    }
}

/// Classify a visit into a channel. Total over its input.
pub fn classify(params: &VisitParams) -> Channel {
    if params.gclid.is_some() {
        return Channel::GoogleAds;
    }
    if params.fbclid.is_some() {
        return Channel::MetaAds;
    }
    if params.msclkid.is_some() {
        return Channel::MicrosoftAds;
    }

    match params.utm_medium.as_deref() {
        Some(medium) if medium.eq_ignore_ascii_case("email") => return Channel::Email,
        Some(medium) if medium.eq_ignore_ascii_case("organic") => return Channel::OrganicSearch,
        _ => {}
    }

    if params.has_campaign_params() {
        Channel::Other
    } else {
        Channel::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> VisitParams {
        pairs
            .iter()
            .fold(VisitParams::default(), |p, (k, v)| p.with(k, *v))
    }

    #[test]
    fn test_click_ids() {
        assert_eq!(classify(&params(&[("gclid", "x")])), Channel::GoogleAds);
        assert_eq!(classify(&params(&[("fbclid", "x")])), Channel::MetaAds);
        assert_eq!(classify(&params(&[("msclkid", "x")])), Channel::MicrosoftAds);
    }

    #[test]
    fn test_click_id_priority() {
        let p = params(&[("msclkid", "m"), ("fbclid", "f"), ("gclid", "g")]);
        assert_eq!(classify(&p), Channel::GoogleAds);

        let p = params(&[("msclkid", "m"), ("fbclid", "f")]);
        assert_eq!(classify(&p), Channel::MetaAds);

        // Click IDs outrank UTM mediums
        let p = params(&[("utm_medium", "email"), ("msclkid", "m")]);
        assert_eq!(classify(&p), Channel::MicrosoftAds);
    }

    #[test]
    fn test_utm_mediums() {
        let p = params(&[("utm_source", "a"), ("utm_medium", "email")]);
        assert_eq!(classify(&p), Channel::Email);

        let p = params(&[("utm_source", "newsletter"), ("utm_medium", "EMAIL")]);
        assert_eq!(classify(&p), Channel::Email);

        let p = params(&[("utm_source", "google"), ("utm_medium", "organic")]);
        assert_eq!(classify(&p), Channel::OrganicSearch);
    }

    #[test]
    fn test_direct() {
        assert_eq!(classify(&VisitParams::default()), Channel::Direct);
    }

    #[test]
    fn test_other_bucket() {
        let p = params(&[("utm_source", "facebook"), ("utm_medium", "social")]);
        assert_eq!(classify(&p), Channel::Other);

        let p = params(&[("utm_source", "partner")]);
        assert_eq!(classify(&p), Channel::Other);

        let p = params(&[("utm_campaign", "spring")]);
        assert_eq!(classify(&p), Channel::Other);
    }

    #[test]
    fn test_string_round_trip() {
        for channel in Channel::all() {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), *channel);
        }
        assert!("tv".parse::<Channel>().is_err());
        assert_eq!(
            serde_json::to_string(&Channel::OrganicSearch).unwrap(),
            "\"organic_search\""
        );
    }
}
