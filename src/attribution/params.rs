//! Visit Parameters
//!
//! Extracts the marketing parameters (UTM tags and ad click IDs) from a
//! landing URL, and the landing page itself.

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

/// Base that bare paths are resolved against; only its path and query survive
const PATH_BASE: &str = "http://localhost/";

/// Marketing parameters carried by a single landing visit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msclkid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
}

impl VisitParams {
    /// Parse a raw query string (`a=b&c=d`, leading `?` optional)
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();

        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let slot = match key.as_ref() {
                "gclid" => &mut params.gclid,
                "fbclid" => &mut params.fbclid,
                "msclkid" => &mut params.msclkid,
                "utm_source" => &mut params.utm_source,
                "utm_medium" => &mut params.utm_medium,
                "utm_campaign" => &mut params.utm_campaign,
                _ => continue,
            };

            // First occurrence wins
            if slot.is_none() {
                *slot = non_empty(value.into_owned());
            }
        }

        params
    }

    /// Builder-style setter used by callers that already have parsed values
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = non_empty(value.into());
        match key {
            "gclid" => self.gclid = value,
            "fbclid" => self.fbclid = value,
            "msclkid" => self.msclkid = value,
            "utm_source" => self.utm_source = value,
            "utm_medium" => self.utm_medium = value,
            "utm_campaign" => self.utm_campaign = value,
            _ => {}
        }
        self
    }

    /// True if any ad-platform click ID is present
    pub fn has_click_id(&self) -> bool {
        self.gclid.is_some() || self.fbclid.is_some() || self.msclkid.is_some()
    }

    /// True if any UTM tag is present
    pub fn has_utm(&self) -> bool {
        self.utm_source.is_some() || self.utm_medium.is_some() || self.utm_campaign.is_some()
    }

    /// True if the visit carries any recognized marketing parameter at all
    pub fn has_campaign_params(&self) -> bool {
        self.has_click_id() || self.has_utm()
    }
}

/// The page a visit landed on: path plus query string, fragment dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingPage {
    pub path: String,
    pub query: String,
}

impl LandingPage {
    /// Parse an absolute URL or a bare path
    ///
    /// Input that cannot be read as either lands on `/` with no query.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        match resolve_url(input) {
            Some(url) => Self {
                path: url.path().to_string(),
                query: url.query().unwrap_or_default().to_string(),
            },
            None => {
                tracing::debug!(input, "Unparseable landing URL, treating as root");
                Self {
                    path: "/".to_string(),
                    query: String::new(),
                }
            }
        }
    }

    /// Marketing parameters found in the query string
    pub fn params(&self) -> VisitParams {
        VisitParams::from_query(&self.query)
    }

    /// `path` or `path?query`, as recorded in snapshots
    pub fn to_landing_string(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

/// Absolute URLs with a host parse as-is; anything else is a path on the site
fn resolve_url(input: &str) -> Option<Url> {
    match Url::parse(input) {
        Ok(url) if url.has_host() => Some(url),
        _ => {
            let base = Url::parse(PATH_BASE).ok()?;
            if input.starts_with('/') || input.starts_with('?') {
                base.join(input).ok()
            } else {
                base.join(&format!("/{}", input)).ok()
            }
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let params = VisitParams::from_query("?utm_source=google&utm_medium=cpc&utm_campaign=spring+sale");
        assert_eq!(params.utm_source.as_deref(), Some("google"));
        assert_eq!(params.utm_medium.as_deref(), Some("cpc"));
        assert_eq!(params.utm_campaign.as_deref(), Some("spring sale"));
        assert!(params.gclid.is_none());
    }

    #[test]
    fn test_empty_values_are_absent() {
        let params = VisitParams::from_query("gclid=&utm_source=%20&fbclid");
        assert!(!params.has_campaign_params());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let params = VisitParams::from_query("gclid=first&gclid=second");
        assert_eq!(params.gclid.as_deref(), Some("first"));
    }

    #[test]
    fn test_percent_decoding() {
        let params = VisitParams::from_query("utm_campaign=impact%20windows%2Ftampa");
        assert_eq!(params.utm_campaign.as_deref(), Some("impact windows/tampa"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let params = VisitParams::from_query("ref=abc&page=2");
        assert_eq!(params, VisitParams::default());
    }

    #[test]
    fn test_landing_page_absolute_url() {
        let landing = LandingPage::parse("https://example.com/quote?gclid=abc#form");
        assert_eq!(landing.path, "/quote");
        assert_eq!(landing.query, "gclid=abc");
        assert_eq!(landing.to_landing_string(), "/quote?gclid=abc");
    }

    #[test]
    fn test_landing_page_bare_host() {
        let landing = LandingPage::parse("https://example.com");
        assert_eq!(landing.to_landing_string(), "/");

        let landing = LandingPage::parse("https://example.com?fbclid=x");
        assert_eq!(landing.to_landing_string(), "/?fbclid=x");
        assert_eq!(landing.params().fbclid.as_deref(), Some("x"));
    }

    #[test]
    fn test_url_inside_query_keeps_path_and_click_id() {
        let landing = LandingPage::parse("/quote?gclid=abc&next=https://example.com/thanks");
        assert_eq!(landing.path, "/quote");
        assert_eq!(landing.params().gclid.as_deref(), Some("abc"));
        assert_eq!(
            crate::attribution::classify(&landing.params()),
            crate::attribution::Channel::GoogleAds
        );

        let landing = LandingPage::parse("windows?fbclid=f1&redirect=http://a.example/b?c=d");
        assert_eq!(landing.path, "/windows");
        assert_eq!(landing.params().fbclid.as_deref(), Some("f1"));
    }

    #[test]
    fn test_query_only_input() {
        let landing = LandingPage::parse("?msclkid=m1");
        assert_eq!(landing.path, "/");
        assert_eq!(landing.params().msclkid.as_deref(), Some("m1"));
    }

    #[test]
    fn test_landing_page_path_only() {
        let landing = LandingPage::parse("/windows/impact");
        assert_eq!(landing.to_landing_string(), "/windows/impact");
        assert!(!landing.params().has_campaign_params());
    }
}
