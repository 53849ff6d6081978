use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

/// Per-agency limit exception layered on top of a plan. At most one row per
/// agency; non-null custom fields win over the resolved base plan.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserOverride {
    pub id: i64,
    pub user_id: i64,
    pub override_plan_id: Option<i64>,
    pub custom_max_projects: Option<i64>,
    pub custom_max_responses: Option<i64>,
    pub custom_max_messages: Option<i64>,
    pub custom_max_collabs: Option<i64>,
    pub custom_badge_label: Option<String>,
    pub custom_badge_color: Option<String>,
    pub admin_notes: Option<String>,
    pub expiration_date: Option<String>,
    pub is_permanent: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct OverrideForm {
    pub override_plan_id: Option<i64>,
    pub custom_max_projects: Option<i64>,
    pub custom_max_responses: Option<i64>,
    pub custom_max_messages: Option<i64>,
    pub custom_max_collabs: Option<i64>,
    pub custom_badge_label: Option<String>,
    pub custom_badge_color: Option<String>,
    pub admin_notes: Option<String>,
    pub expiration_date: Option<String>,
    pub is_permanent: Option<bool>,
}

/// Override joined with the owning agency, for the admin listing.
#[derive(Debug, Serialize)]
pub struct OverrideListing {
    pub id: i64,
    pub user_id: i64,
    pub agency_name: String,
    pub email: String,
    pub override_plan_id: Option<i64>,
    pub expiration_date: Option<String>,
    pub is_permanent: bool,
    pub created_at: String,
}

impl UserOverride {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let is_permanent: i64 = row.get("is_permanent")?;
        Ok(UserOverride {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            override_plan_id: row.get("override_plan_id")?,
            custom_max_projects: row.get("custom_max_projects")?,
            custom_max_responses: row.get("custom_max_responses")?,
            custom_max_messages: row.get("custom_max_messages")?,
            custom_max_collabs: row.get("custom_max_collabs")?,
            custom_badge_label: row.get("custom_badge_label")?,
            custom_badge_color: row.get("custom_badge_color")?,
            admin_notes: row.get("admin_notes")?,
            expiration_date: row.get("expiration_date")?,
            is_permanent: is_permanent != 0,
            created_at: row.get("created_at")?,
        })
    }

    /// The override that should influence limit decisions right now.
    /// An expired non-permanent row is ignored here, never deleted — cleanup
    /// is a separate explicit operation (`sweep_expired`).
    pub fn active_for_user(pool: &DbPool, user_id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM user_overrides
             WHERE user_id = ?1
             AND (is_permanent = 1 OR expiration_date IS NULL OR expiration_date >= datetime('now'))",
            params![user_id],
            Self::from_row,
        )
        .ok()
    }

    /// The stored row regardless of expiration, for the admin edit form.
    pub fn find_by_user(pool: &DbPool, user_id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM user_overrides WHERE user_id = ?1",
            params![user_id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_all(pool: &DbPool) -> Vec<OverrideListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT uo.id, uo.user_id, a.agency_name, a.email, uo.override_plan_id,
                    uo.expiration_date, uo.is_permanent, uo.created_at
             FROM user_overrides uo
             JOIN agencies a ON uo.user_id = a.id
             ORDER BY uo.created_at DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], |row| {
            let is_permanent: i64 = row.get("is_permanent")?;
            Ok(OverrideListing {
                id: row.get("id")?,
                user_id: row.get("user_id")?,
                agency_name: row.get("agency_name")?,
                email: row.get("email")?,
                override_plan_id: row.get("override_plan_id")?,
                expiration_date: row.get("expiration_date")?,
                is_permanent: is_permanent != 0,
                created_at: row.get("created_at")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    /// Create or replace the override for an agency.
    pub fn upsert(pool: &DbPool, user_id: i64, form: &OverrideForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO user_overrides (
                user_id, override_plan_id, custom_max_projects, custom_max_responses,
                custom_max_messages, custom_max_collabs, custom_badge_label,
                custom_badge_color, admin_notes, expiration_date, is_permanent
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(user_id) DO UPDATE SET
                override_plan_id = ?2, custom_max_projects = ?3, custom_max_responses = ?4,
                custom_max_messages = ?5, custom_max_collabs = ?6, custom_badge_label = ?7,
                custom_badge_color = ?8, admin_notes = ?9, expiration_date = ?10,
                is_permanent = ?11",
            params![
                user_id,
                form.override_plan_id,
                form.custom_max_projects,
                form.custom_max_responses,
                form.custom_max_messages,
                form.custom_max_collabs,
                form.custom_badge_label,
                form.custom_badge_color,
                form.admin_notes,
                form.expiration_date,
                form.is_permanent.unwrap_or(false) as i64,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete_for_user(pool: &DbPool, user_id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM user_overrides WHERE user_id = ?1", params![user_id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Delete expired non-permanent overrides. Invoked from the admin
    /// maintenance action, never from the limit-decision read path.
    pub fn sweep_expired(pool: &DbPool) -> Result<usize, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM user_overrides
             WHERE is_permanent = 0
             AND expiration_date IS NOT NULL
             AND expiration_date < datetime('now')",
            [],
        )
        .map_err(|e| e.to_string())
    }
}
