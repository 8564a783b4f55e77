use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{Lead, ValidLead};
use crate::attribution::{AttributionSnapshot, Channel, ThreeSlotState};
use crate::db::{timestamp, Database, DbError, DbResult};

const LEAD_COLUMNS: &str = "id, email, name, phone, source_tool, session_data, first_touch, \
     last_touch, last_non_direct, channel, visitor_id, created_at, updated_at";

/// Result of saving a lead
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub lead: Lead,
    /// False when an existing lead with the same email was refreshed
    pub created: bool,
}

/// Aggregates shown on the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub total: i64,
    pub by_channel: BTreeMap<String, i64>,
    pub by_source_tool: BTreeMap<String, i64>,
    pub recent: Vec<Lead>,
}

fn parse_time(raw: &str, column: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Serialization(format!("invalid {} timestamp: {}", column, e)))
}

/// Stored snapshot JSON; anything unreadable degrades to a direct record
fn parse_snapshot(raw: &str) -> AttributionSnapshot {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Malformed attribution stored on lead");
        AttributionSnapshot::direct("/", None)
    })
}

fn row_to_lead(row: &Row) -> DbResult<Lead> {
    let session_data: Option<String> = row.get("session_data")?;
    let channel: String = row.get("channel")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let first_touch: String = row.get("first_touch")?;
    let last_touch: String = row.get("last_touch")?;
    let last_non_direct: String = row.get("last_non_direct")?;

    Ok(Lead {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        source_tool: row.get("source_tool")?,
        session_data: session_data.and_then(|s| serde_json::from_str(&s).ok()),
        first_touch: parse_snapshot(&first_touch),
        last_touch: parse_snapshot(&last_touch),
        last_non_direct: parse_snapshot(&last_non_direct),
        channel: channel.parse().unwrap_or(Channel::Direct),
        visitor_id: row.get("visitor_id")?,
        created_at: parse_time(&created_at, "created_at")?,
        updated_at: parse_time(&updated_at, "updated_at")?,
    })
}

fn find_by_email(tx: &Transaction<'_>, email: &str) -> DbResult<Option<Lead>> {
    let mut stmt = tx.prepare(&format!("SELECT {} FROM leads WHERE email = ?1", LEAD_COLUMNS))?;
    let mut rows = stmt.query(params![email])?;
    let lead = match rows.next()? {
        Some(row) => Some(row_to_lead(row)?),
        None => None,
    };
    Ok(lead)
}

fn merge_lead(
    existing: Option<Lead>,
    incoming: ValidLead,
    attribution: ThreeSlotState,
) -> (Lead, bool) {
    // Stored timestamps keep microseconds
    let now = Utc::now().trunc_subsecs(6);

    match existing {
        Some(lead) => {
            let ThreeSlotState {
                last_touch,
                last_non_direct,
                ..
            } = attribution;
            let last_non_direct = last_non_direct.unwrap_or(lead.last_non_direct);

            let merged = Lead {
                name: incoming.name.or(lead.name),
                phone: incoming.phone.or(lead.phone),
                source_tool: incoming.source_tool,
                session_data: incoming.session_data.or(lead.session_data),
                last_touch: last_touch.unwrap_or(lead.last_touch),
                channel: last_non_direct.channel,
                last_non_direct,
                visitor_id: incoming.visitor_id.or(lead.visitor_id),
                updated_at: now,
                // First touch and identity stay as first recorded
                ..lead
            };
            (merged, false)
        }
        None => {
            let resolved = attribution.resolved();
            let lead = Lead {
                id: uuid::Uuid::new_v4().to_string(),
                email: incoming.email,
                name: incoming.name,
                phone: incoming.phone,
                source_tool: incoming.source_tool,
                session_data: incoming.session_data,
                channel: resolved.last_non_direct.channel,
                first_touch: resolved.first_touch,
                last_touch: resolved.last_touch,
                last_non_direct: resolved.last_non_direct,
                visitor_id: incoming.visitor_id,
                created_at: now,
                updated_at: now,
            };
            (lead, true)
        }
    }
}

fn write_lead(tx: &Transaction<'_>, lead: &Lead) -> DbResult<()> {
    let session_data = match &lead.session_data {
        Some(value) => Some(serde_json::to_string(value)?),
        None => None,
    };

    tx.execute(
        "INSERT INTO leads (id, email, name, phone, source_tool, session_data, first_touch,
                            last_touch, last_non_direct, channel, visitor_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(email) DO UPDATE SET
            name = excluded.name,
            phone = excluded.phone,
            source_tool = excluded.source_tool,
            session_data = excluded.session_data,
            last_touch = excluded.last_touch,
            last_non_direct = excluded.last_non_direct,
            channel = excluded.channel,
            visitor_id = excluded.visitor_id,
            updated_at = excluded.updated_at",
        params![
            lead.id,
            lead.email,
            lead.name,
            lead.phone,
            lead.source_tool,
            session_data,
            serde_json::to_string(&lead.first_touch)?,
            serde_json::to_string(&lead.last_touch)?,
            serde_json::to_string(&lead.last_non_direct)?,
            lead.channel.as_str(),
            lead.visitor_id,
            timestamp(lead.created_at),
            timestamp(lead.updated_at),
        ],
    )?;

    Ok(())
}

impl Database {
    /// Insert a new lead or refresh the existing one with the same email.
    ///
    /// `attribution` is the visitor's slot state as known at submission time;
    /// absent slots fall back to `direct` for new leads and to the stored
    /// values for existing ones.
    pub async fn save_lead(
        &self,
        incoming: ValidLead,
        attribution: ThreeSlotState,
    ) -> DbResult<SaveOutcome> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let existing = find_by_email(&tx, &incoming.email)?;
            let (lead, created) = merge_lead(existing, incoming, attribution);
            write_lead(&tx, &lead)?;

            tx.commit()?;
            Ok(SaveOutcome { lead, created })
        })
        .await
    }

    pub async fn get_lead(&self, id: &str) -> DbResult<Lead> {
        let id = id.to_string();

        self.execute(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS))?;
            let lead = stmt
                .query_row(params![id], |row| Ok(row_to_lead(row)))
                .optional()?;

            match lead {
                Some(lead) => lead,
                None => Err(DbError::NotFound(format!("lead {}", id))),
            }
        })
        .await
    }

    /// Newest leads first
    pub async fn recent_leads(&self, limit: usize) -> DbResult<Vec<Lead>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM leads ORDER BY created_at DESC, id DESC LIMIT ?1",
                LEAD_COLUMNS
            ))?;

            let mut rows = stmt.query(params![limit as i64])?;
            let mut leads = Vec::new();
            while let Some(row) = rows.next()? {
                leads.push(row_to_lead(row)?);
            }
            Ok(leads)
        })
        .await
    }

    /// Counts by credited channel and by source tool, plus the latest leads
    pub async fn lead_summary(&self, recent_limit: usize) -> DbResult<LeadSummary> {
        let recent = self.recent_leads(recent_limit).await?;

        let (total, by_channel, by_source_tool) = self
            .execute(|conn| {
                let total: i64 = conn.query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?;

                let mut by_channel = BTreeMap::new();
                let mut stmt =
                    conn.prepare("SELECT channel, COUNT(*) FROM leads GROUP BY channel")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    by_channel.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)?);
                }

                let mut by_source_tool = BTreeMap::new();
                let mut stmt =
                    conn.prepare("SELECT source_tool, COUNT(*) FROM leads GROUP BY source_tool")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    by_source_tool.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)?);
                }

                Ok((total, by_channel, by_source_tool))
            })
            .await?;

        Ok(LeadSummary {
            total,
            by_channel,
            by_source_tool,
            recent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{AttributionTracker, MemorySlotStore};
    use crate::leads::NewLead;

    fn lead(email: &str, tool: &str) -> ValidLead {
        NewLead {
            email: email.to_string(),
            source_tool: tool.to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn slots(urls: &[&str]) -> ThreeSlotState {
        let store = MemorySlotStore::new();
        let tracker = AttributionTracker::new();
        for url in urls {
            tracker.record_visit(&store, "v", url).unwrap();
        }
        crate::attribution::load_state(&store)
    }

    #[tokio::test]
    async fn test_new_lead_without_attribution_is_direct() {
        let db = Database::open_in_memory().unwrap();
        let outcome = db
            .save_lead(lead("a@example.com", "quote_builder"), ThreeSlotState::default())
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.lead.channel, Channel::Direct);
        assert_eq!(outcome.lead.first_touch.channel, Channel::Direct);

        let fetched = db.get_lead(&outcome.lead.id).await.unwrap();
        assert_eq!(fetched.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_resubmission_keeps_first_touch() {
        let db = Database::open_in_memory().unwrap();

        let first = db
            .save_lead(lead("b@example.com", "quote_builder"), slots(&["/?gclid=g1"]))
            .await
            .unwrap();

        let mut again = lead("b@example.com", "consultation_form");
        again.name = Some("Bob".to_string());
        let second = db.save_lead(again, slots(&["/?fbclid=f1"])).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.lead.id, first.lead.id);
        assert_eq!(second.lead.first_touch.channel, Channel::GoogleAds);
        assert_eq!(second.lead.last_touch.channel, Channel::MetaAds);
        assert_eq!(second.lead.channel, Channel::MetaAds);
        assert_eq!(second.lead.source_tool, "consultation_form");
        assert_eq!(second.lead.name.as_deref(), Some("Bob"));

        let stored = db.get_lead(&first.lead.id).await.unwrap();
        assert_eq!(stored.first_touch, first.lead.first_touch);
        assert_eq!(stored.created_at, first.lead.created_at);
    }

    #[tokio::test]
    async fn test_direct_resubmission_keeps_credited_channel() {
        let db = Database::open_in_memory().unwrap();
        db.save_lead(lead("c@example.com", "calculator"), slots(&["/?msclkid=m"]))
            .await
            .unwrap();

        // A direct-only visitor state carries no last-non-direct slot
        let outcome = db
            .save_lead(lead("c@example.com", "calculator"), slots(&["/"]))
            .await
            .unwrap();

        assert_eq!(outcome.lead.last_touch.channel, Channel::Direct);
        assert_eq!(outcome.lead.last_non_direct.channel, Channel::MicrosoftAds);
        assert_eq!(outcome.lead.channel, Channel::MicrosoftAds);
        assert_eq!(outcome.lead.first_touch.channel, Channel::MicrosoftAds);
    }

    #[tokio::test]
    async fn test_missing_lead() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_lead("nope").await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_summary() {
        let db = Database::open_in_memory().unwrap();
        db.save_lead(lead("a@example.com", "quote_builder"), slots(&["/?gclid=1"]))
            .await
            .unwrap();
        db.save_lead(lead("b@example.com", "quote_builder"), slots(&["/?gclid=2"]))
            .await
            .unwrap();
        db.save_lead(lead("c@example.com", "calculator"), slots(&["/"]))
            .await
            .unwrap();

        let summary = db.lead_summary(2).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_channel.get("google_ads"), Some(&2));
        assert_eq!(summary.by_channel.get("direct"), Some(&1));
        assert_eq!(summary.by_source_tool.get("quote_builder"), Some(&2));
        assert_eq!(summary.recent.len(), 2);
    }
}
