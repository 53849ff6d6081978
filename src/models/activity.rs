use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

/// Append-only audit trail written by every significant mutation.
#[derive(Debug, Serialize, Clone)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub metadata_json: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ActivityListing {
    #[serde(flatten)]
    pub entry: ActivityEntry,
    pub agency_name: Option<String>,
}

impl ActivityEntry {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(ActivityEntry {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            action: row.get("action")?,
            metadata_json: row.get("metadata_json")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Best-effort: logging must never fail the surrounding request.
    pub fn log(pool: &DbPool, action: &str, user_id: Option<i64>, metadata: serde_json::Value) {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(e) => {
                log::warn!("activity log skipped ({}): {}", action, e);
                return;
            }
        };
        if let Err(e) = conn.execute(
            "INSERT INTO activity_log (user_id, action, metadata_json) VALUES (?1, ?2, ?3)",
            params![user_id, action, metadata.to_string()],
        ) {
            log::warn!("activity log failed ({}): {}", action, e);
        }
    }

    pub fn recent(pool: &DbPool, limit: i64) -> Vec<ActivityListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT al.*, a.agency_name
             FROM activity_log al
             LEFT JOIN agencies a ON al.user_id = a.id
             ORDER BY al.created_at DESC
             LIMIT ?1",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![limit], |row| {
            Ok(ActivityListing {
                entry: Self::from_row(row)?,
                agency_name: row.get("agency_name")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn list_for_user(pool: &DbPool, user_id: i64, limit: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM activity_log WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![user_id, limit], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }
}
