//! Call-dispatch agents
//!
//! The people (or dialer seats) inbound leads get routed to. Admins list,
//! add, enable/disable and edit them; each change is a single-row write.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{timestamp, Database, DbError, DbResult};
use crate::leads::normalize_phone;

const AGENT_COLUMNS: &str =
    "id, agent_id, name, phone, enabled, priority, notes, created_at, updated_at";

/// A call-dispatch agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAgent {
    pub id: String,
    /// Identifier in the dispatch/dialer system
    pub agent_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub enabled: bool,
    /// Lower numbers are dispatched first
    pub priority: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCallAgent {
    pub agent_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of a partial update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAgentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewCallAgent {
    /// Check and normalize the fields. Returns a message on failure.
    pub fn validate(mut self) -> Result<Self, String> {
        self.agent_id = self.agent_id.trim().to_string();
        self.name = self.name.trim().to_string();

        if self.agent_id.is_empty() {
            return Err("agentId is required".to_string());
        }
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        self.phone = validate_phone(self.phone)?;
        if let Some(priority) = self.priority {
            validate_priority(priority)?;
        }
        Ok(self)
    }
}

impl CallAgentUpdate {
    pub fn validate(mut self) -> Result<Self, String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("name cannot be empty".to_string());
            }
            self.name = Some(name.trim().to_string());
        }
        self.phone = validate_phone(self.phone)?;
        if let Some(priority) = self.priority {
            validate_priority(priority)?;
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.enabled.is_none()
            && self.priority.is_none()
            && self.notes.is_none()
    }
}

fn validate_phone(phone: Option<String>) -> Result<Option<String>, String> {
    match phone.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => normalize_phone(raw).map(Some).map_err(|e| e.to_string()),
        _ => Ok(None),
    }
}

fn validate_priority(priority: i64) -> Result<(), String> {
    if !(0..=1000).contains(&priority) {
        return Err("priority must be between 0 and 1000".to_string());
    }
    Ok(())
}

fn row_to_agent(row: &Row) -> DbResult<CallAgent> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(CallAgent {
        id: row.get("id")?,
        agent_id: row.get("agent_id")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        priority: row.get("priority")?,
        notes: row.get("notes")?,
        created_at: parse_time(&created_at, "created_at")?,
        updated_at: parse_time(&updated_at, "updated_at")?,
    })
}

fn parse_time(raw: &str, column: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Serialization(format!("invalid agent {}: {}", column, e)))
}

fn fetch_agent(conn: &Connection, id: &str) -> DbResult<CallAgent> {
    conn.query_row(
        &format!("SELECT {} FROM call_agents WHERE id = ?1", AGENT_COLUMNS),
        params![id],
        |row| Ok(row_to_agent(row)),
    )
    .optional()?
    .unwrap_or_else(|| Err(DbError::NotFound(format!("call agent {}", id))))
}

impl Database {
    /// All agents, highest dispatch priority first
    pub async fn list_call_agents(&self) -> DbResult<Vec<CallAgent>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM call_agents ORDER BY priority ASC, name ASC",
                AGENT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], |row| Ok(row_to_agent(row)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().collect()
        })
        .await
    }

    pub async fn create_call_agent(&self, agent: NewCallAgent) -> DbResult<CallAgent> {
        self.execute(move |conn| {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM call_agents WHERE agent_id = ?1",
                params![agent.agent_id],
                |row| row.get(0),
            )?;
            if exists > 0 {
                return Err(DbError::Conflict(format!(
                    "call agent {} already exists",
                    agent.agent_id
                )));
            }

            let id = uuid::Uuid::new_v4().to_string();
            let now = timestamp(Utc::now());
            conn.execute(
                "INSERT INTO call_agents
                    (id, agent_id, name, phone, enabled, priority, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id,
                    agent.agent_id,
                    agent.name,
                    agent.phone,
                    agent.enabled.unwrap_or(true),
                    agent.priority.unwrap_or(100),
                    agent.notes,
                    now,
                ],
            )?;

            fetch_agent(conn, &id)
        })
        .await
    }

    /// Flip an agent on or off
    pub async fn set_call_agent_enabled(&self, id: &str, enabled: bool) -> DbResult<CallAgent> {
        let id = id.to_string();

        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE call_agents SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
                params![enabled, timestamp(Utc::now()), id],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("call agent {}", id)));
            }
            fetch_agent(conn, &id)
        })
        .await
    }

    pub async fn update_call_agent(
        &self,
        id: &str,
        update: CallAgentUpdate,
    ) -> DbResult<CallAgent> {
        let id = id.to_string();

        self.execute(move |conn| {
            let current = fetch_agent(conn, &id)?;

            conn.execute(
                "UPDATE call_agents
                 SET name = ?1, phone = ?2, enabled = ?3, priority = ?4, notes = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    update.name.unwrap_or(current.name),
                    update.phone.or(current.phone),
                    update.enabled.unwrap_or(current.enabled),
                    update.priority.unwrap_or(current.priority),
                    update.notes.or(current.notes),
                    timestamp(Utc::now()),
                    id,
                ],
            )?;

            fetch_agent(conn, &id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_agent(agent_id: &str, name: &str, priority: i64) -> NewCallAgent {
        NewCallAgent {
            agent_id: agent_id.to_string(),
            name: name.to_string(),
            phone: Some("813-555-0100".to_string()),
            enabled: None,
            priority: Some(priority),
            notes: None,
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = Database::open_in_memory().unwrap();
        db.create_call_agent(new_agent("ag-2", "Zed", 20)).await.unwrap();
        db.create_call_agent(new_agent("ag-1", "Amy", 10)).await.unwrap();

        let agents = db.list_call_agents().await.unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].agent_id, "ag-1");
        assert!(agents[0].enabled);
        assert_eq!(agents[0].phone.as_deref(), Some("+18135550100"));
    }

    #[tokio::test]
    async fn test_duplicate_agent_id() {
        let db = Database::open_in_memory().unwrap();
        db.create_call_agent(new_agent("ag-1", "Amy", 10)).await.unwrap();
        let err = db
            .create_call_agent(new_agent("ag-1", "Other", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_toggle_enabled() {
        let db = Database::open_in_memory().unwrap();
        let agent = db.create_call_agent(new_agent("ag-1", "Amy", 10)).await.unwrap();

        let disabled = db.set_call_agent_enabled(&agent.id, false).await.unwrap();
        assert!(!disabled.enabled);

        let err = db.set_call_agent_enabled("missing", true).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let db = Database::open_in_memory().unwrap();
        let agent = db.create_call_agent(new_agent("ag-1", "Amy", 10)).await.unwrap();

        let update = CallAgentUpdate {
            notes: Some("Spanish speaker".to_string()),
            priority: Some(1),
            ..Default::default()
        };
        let updated = db.update_call_agent(&agent.id, update).await.unwrap();

        assert_eq!(updated.name, "Amy");
        assert_eq!(updated.priority, 1);
        assert_eq!(updated.notes.as_deref(), Some("Spanish speaker"));
        assert_eq!(updated.phone, agent.phone);
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.create_call_agent(new_agent("ag-1", "Amy", 10)).await.unwrap();
        db.execute(|conn| {
            conn.execute("UPDATE call_agents SET created_at = 'yesterday'", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let err = db.list_call_agents().await.unwrap_err();
        assert!(matches!(err, DbError::Serialization(_)));
    }

    #[test]
    fn test_validation() {
        let bad = NewCallAgent {
            agent_id: " ".to_string(),
            name: "Amy".to_string(),
            phone: None,
            enabled: None,
            priority: None,
            notes: None,
        };
        assert!(bad.validate().is_err());

        let bad_priority = CallAgentUpdate {
            priority: Some(-1),
            ..Default::default()
        };
        assert!(bad_priority.validate().is_err());
        assert!(CallAgentUpdate::default().is_empty());
    }
}
