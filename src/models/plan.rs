use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub max_projects: i64,
    pub max_responses: i64,
    pub max_collabs: i64,
    pub max_messages: i64,
    pub highlight_label: Option<String>,
    pub highlight_badge_color: Option<String>,
    pub price: f64,
    pub description: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanForm {
    pub name: String,
    pub max_projects: i64,
    pub max_responses: i64,
    pub max_collabs: i64,
    pub max_messages: i64,
    pub highlight_label: Option<String>,
    pub highlight_badge_color: Option<String>,
    pub price: f64,
    pub description: Option<String>,
    pub is_default: Option<bool>,
}

impl Plan {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let is_default: i64 = row.get("is_default")?;
        let is_active: i64 = row.get("is_active")?;
        Ok(Plan {
            id: row.get("id")?,
            name: row.get("name")?,
            max_projects: row.get("max_projects")?,
            max_responses: row.get("max_responses")?,
            max_collabs: row.get("max_collabs")?,
            max_messages: row.get("max_messages")?,
            highlight_label: row.get("highlight_label")?,
            highlight_badge_color: row.get("highlight_badge_color")?,
            price: row.get("price")?,
            description: row.get("description")?,
            is_default: is_default != 0,
            is_active: is_active != 0,
            created_at: row.get("created_at")?,
        })
    }

    pub fn list_active(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT * FROM plans WHERE is_active = 1 ORDER BY price ASC") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_all(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT * FROM plans ORDER BY price ASC") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM plans WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    /// Tier names on the agency row are lowercase ('premium') while plan rows
    /// carry display names ('Premium'), so the lookup ignores case.
    pub fn find_by_name(pool: &DbPool, name: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM plans WHERE name = ?1 COLLATE NOCASE",
            params![name],
            Self::from_row,
        )
        .ok()
    }

    pub fn default_plan(pool: &DbPool) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM plans WHERE is_default = 1 AND is_active = 1",
            [],
            Self::from_row,
        )
        .ok()
    }

    pub fn create(pool: &DbPool, form: &PlanForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO plans (name, max_projects, max_responses, max_collabs, max_messages,
             highlight_label, highlight_badge_color, price, description, is_default, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
            params![
                form.name,
                form.max_projects,
                form.max_responses,
                form.max_collabs,
                form.max_messages,
                form.highlight_label,
                form.highlight_badge_color,
                form.price,
                form.description,
                form.is_default.unwrap_or(false) as i64,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &PlanForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE plans SET name = ?1, max_projects = ?2, max_responses = ?3,
             max_collabs = ?4, max_messages = ?5, highlight_label = ?6,
             highlight_badge_color = ?7, price = ?8, description = ?9, is_default = ?10
             WHERE id = ?11",
            params![
                form.name,
                form.max_projects,
                form.max_responses,
                form.max_collabs,
                form.max_messages,
                form.highlight_label,
                form.highlight_badge_color,
                form.price,
                form.description,
                form.is_default.unwrap_or(false) as i64,
                id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn set_active(pool: &DbPool, id: i64, active: bool) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE plans SET is_active = ?1 WHERE id = ?2",
            params![active as i64, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }
}
