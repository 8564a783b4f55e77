//! Schema migrations
//!
//! Versions are tracked with `PRAGMA user_version` and applied in order
//! inside a single transaction.

use rusqlite::{Connection, Transaction};

use super::{DbError, DbResult};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

pub const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS attribution_slots (
    visitor_id TEXT NOT NULL,
    slot_key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (visitor_id, slot_key)
);

CREATE TABLE IF NOT EXISTS leads (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    phone TEXT,
    source_tool TEXT NOT NULL,
    session_data TEXT,
    first_touch TEXT NOT NULL,
    last_touch TEXT NOT NULL,
    last_non_direct TEXT NOT NULL,
    channel TEXT NOT NULL,
    visitor_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at);
CREATE INDEX IF NOT EXISTS idx_leads_channel ON leads(channel);

CREATE TABLE IF NOT EXISTS call_agents (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    phone TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 100,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, role)
);
";

pub const SCHEMA_V2: &str = "
CREATE TABLE IF NOT EXISTS email_log (
    id TEXT PRIMARY KEY,
    recipient TEXT NOT NULL,
    email_type TEXT NOT NULL,
    subject TEXT NOT NULL,
    provider_id TEXT,
    simulated INTEGER NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_email_log_recipient ON email_log(recipient);
";

pub fn run_migrations(conn: &mut Connection) -> DbResult<()> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database version ({}) is newer than supported schema ({})",
            version, CURRENT_SCHEMA_VERSION
        )));
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)?;
        tracing::info!(version = next_version, "Applied schema migration");
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> DbResult<()> {
    let sql = match version {
        1 => SCHEMA_V1,
        2 => SCHEMA_V2,
        other => {
            return Err(DbError::Migration(format!(
                "no migration defined for version {}",
                other
            )))
        }
    };

    tx.execute_batch(sql)
        .map_err(|e| DbError::Migration(format!("migration to version {} failed: {}", version, e)))
}
