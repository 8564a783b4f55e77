//! Lead Capture
//!
//! Validation and storage for leads submitted by the site's tools (quote
//! builders, consultation forms, calculators). Each lead carries the
//! visitor's three attribution slots; an existing lead keeps its original
//! first touch when the same email comes back.

mod repository;

pub use repository::{LeadSummary, SaveOutcome};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use crate::attribution::{AttributionSnapshot, Channel, ThreeSlotState};
use crate::db::DbError;

/// Errors from lead validation and storage
#[derive(Error, Debug)]
pub enum LeadError {
    #[error("Invalid lead: {0}")]
    Validation(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

pub type LeadResult<T> = Result<T, LeadError>;

/// A stored lead
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub source_tool: String,
    pub session_data: Option<serde_json::Value>,
    pub first_touch: AttributionSnapshot,
    pub last_touch: AttributionSnapshot,
    pub last_non_direct: AttributionSnapshot,
    /// Channel of the last non-direct touch, the one credited for the lead
    pub channel: Channel,
    pub visitor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming lead submission, before validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub source_tool: String,
    #[serde(default)]
    pub session_data: Option<serde_json::Value>,
    /// Client-side slots; parsed slot by slot so one bad slot does not reject the lead
    #[serde(default)]
    pub attribution: Option<serde_json::Value>,
    #[serde(default)]
    pub visitor_id: Option<String>,
}

/// A submission that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidLead {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub source_tool: String,
    pub session_data: Option<serde_json::Value>,
    pub attribution: Option<ThreeSlotState>,
    pub visitor_id: Option<String>,
}

impl NewLead {
    pub fn validate(self) -> LeadResult<ValidLead> {
        let email = normalize_email(&self.email)?;

        let source_tool = self.source_tool.trim().to_string();
        if source_tool.is_empty() {
            return Err(LeadError::Validation("sourceTool is required".to_string()));
        }
        if source_tool.len() > 100 {
            return Err(LeadError::Validation(
                "sourceTool exceeds maximum length of 100 characters".to_string(),
            ));
        }

        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let phone = match self.phone.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(normalize_phone(raw)?),
            _ => None,
        };

        let visitor_id = self
            .visitor_id
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(ValidLead {
            email,
            name,
            phone,
            source_tool,
            session_data: self.session_data.filter(|v| !v.is_null()),
            attribution: self.attribution.as_ref().map(parse_attribution),
            visitor_id,
        })
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// Trim, lowercase and check the shape of an email address
pub fn normalize_email(raw: &str) -> LeadResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(LeadError::Validation("email is required".to_string()));
    }
    if email.len() > 254 || !email_regex().is_match(&email) {
        return Err(LeadError::Validation(format!("invalid email address: {}", raw.trim())));
    }
    Ok(email)
}

/// Normalize a US phone number to `+1XXXXXXXXXX`
pub fn normalize_phone(raw: &str) -> LeadResult<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => {
            return Err(LeadError::Validation(format!(
                "invalid phone number: {}",
                raw
            )))
        }
    };

    Ok(format!("+1{}", national))
}

/// Read the three slots out of a client payload, ignoring any slot that
/// does not parse
pub fn parse_attribution(value: &serde_json::Value) -> ThreeSlotState {
    let slot = |key: &str| -> Option<AttributionSnapshot> {
        let raw = value.get(key)?;
        if raw.is_null() {
            return None;
        }
        match serde_json::from_value(raw.clone()) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(slot = key, error = %e, "Ignoring malformed attribution in lead");
                None
            }
        }
    };

    ThreeSlotState {
        first_touch: slot("first_touch"),
        last_touch: slot("last_touch"),
        last_non_direct: slot("last_non_direct"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission() -> NewLead {
        NewLead {
            email: "  Jane.Doe@Example.COM ".to_string(),
            name: Some(" Jane ".to_string()),
            phone: Some("(813) 555-0142".to_string()),
            source_tool: "quote_builder".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_normalizes_fields() {
        let lead = submission().validate().unwrap();
        assert_eq!(lead.email, "jane.doe@example.com");
        assert_eq!(lead.name.as_deref(), Some("Jane"));
        assert_eq!(lead.phone.as_deref(), Some("+18135550142"));
        assert!(lead.attribution.is_none());
    }

    #[test]
    fn test_invalid_email() {
        for email in ["", "jane", "jane@", "jane@example", "ja ne@example.com"] {
            let lead = NewLead {
                email: email.to_string(),
                ..submission()
            };
            assert!(
                matches!(lead.validate(), Err(LeadError::Validation(_))),
                "{:?} should be rejected",
                email
            );
        }
    }

    #[test]
    fn test_source_tool_required() {
        let lead = NewLead {
            source_tool: "   ".to_string(),
            ..submission()
        };
        assert!(matches!(lead.validate(), Err(LeadError::Validation(_))));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("1-813-555-0142").unwrap(), "+18135550142");
        assert_eq!(normalize_phone("813.555.0142").unwrap(), "+18135550142");
        assert!(normalize_phone("555-0142").is_err());
        assert!(normalize_phone("2-813-555-0142").is_err());
    }

    #[test]
    fn test_blank_phone_is_absent() {
        let lead = NewLead {
            phone: Some("  ".to_string()),
            ..submission()
        };
        assert!(lead.validate().unwrap().phone.is_none());
    }

    #[test]
    fn test_parse_attribution_skips_bad_slots() {
        let payload = json!({
            "first_touch": {"channel": "google_ads", "landing_page": "/?gclid=a", "gclid": "a"},
            "last_touch": "not-valid-json",
            "last_non_direct": null
        });
        let state = parse_attribution(&payload);

        assert_eq!(state.first_touch.unwrap().channel, Channel::GoogleAds);
        assert!(state.last_touch.is_none());
        assert!(state.last_non_direct.is_none());
    }
}
