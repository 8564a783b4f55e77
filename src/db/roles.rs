//! User roles, looked up to gate admin endpoints

use chrono::Utc;
use rusqlite::params;

use super::{Database, DbResult};

pub const ADMIN_ROLE: &str = "admin";

impl Database {
    /// Grant a role. Returns false if the user already had it.
    pub async fn grant_role(&self, user_id: &str, role: &str) -> DbResult<bool> {
        let user_id = user_id.to_string();
        let role = role.to_string();

        self.execute(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, role, super::timestamp(Utc::now())],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    /// Revoke a role. Returns false if the user did not have it.
    pub async fn revoke_role(&self, user_id: &str, role: &str) -> DbResult<bool> {
        let user_id = user_id.to_string();
        let role = role.to_string();

        self.execute(move |conn| {
            let removed = conn.execute(
                "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
                params![user_id, role],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    pub async fn has_role(&self, user_id: &str, role: &str) -> DbResult<bool> {
        let user_id = user_id.to_string();
        let role = role.to_string();

        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM user_roles WHERE user_id = ?1 AND role = ?2",
                params![user_id, role],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }
}
