use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::models::reveal::IdentityReveal;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub id: i64,
    pub agency_id: i64,
    pub title: String,
    pub description: String,
    pub project_type: String,
    pub platforms_involved: Option<String>,
    pub budget_range: Option<String>,
    pub deadline: Option<String>,
    pub hide_identity: bool,
    pub status: String, // open, closed
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectForm {
    pub title: String,
    pub description: String,
    pub project_type: String,
    pub platforms_involved: Option<String>,
    pub budget_range: Option<String>,
    pub deadline: Option<String>,
    pub hide_identity: Option<bool>,
}

/// Project joined with owner fields, as shown on the marketplace.
#[derive(Debug, Serialize, Clone)]
pub struct ProjectListing {
    #[serde(flatten)]
    pub project: Project,
    pub agency_name: String,
    pub rating_average: f64,
    pub subscription_tier: String,
}

#[derive(Debug, Default)]
pub struct ProjectFilters<'a> {
    pub status: Option<&'a str>,
    pub project_type: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub agency_id: Option<i64>,
}

pub const PROJECT_TYPES: &[&str] =
    &["collaboration", "overflow", "shared_account", "joint_venture", "other"];

impl Project {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let hide: i64 = row.get("hide_identity")?;
        Ok(Project {
            id: row.get("id")?,
            agency_id: row.get("agency_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            project_type: row.get("project_type")?,
            platforms_involved: row.get("platforms_involved")?,
            budget_range: row.get("budget_range")?,
            deadline: row.get("deadline")?,
            hide_identity: hide != 0,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }

    fn listing_from_row(row: &rusqlite::Row) -> rusqlite::Result<ProjectListing> {
        Ok(ProjectListing {
            project: Self::from_row(row)?,
            agency_name: row.get("agency_name")?,
            rating_average: row.get("rating_average")?,
            subscription_tier: row.get("subscription_tier")?,
        })
    }

    pub fn create(pool: &DbPool, agency_id: i64, form: &ProjectForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO projects (agency_id, title, description, project_type,
             platforms_involved, budget_range, deadline, hide_identity, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'open')",
            params![
                agency_id,
                form.title,
                form.description,
                form.project_type,
                form.platforms_involved,
                form.budget_range,
                form.deadline,
                form.hide_identity.unwrap_or(false) as i64,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM projects WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    /// Project with owner fields for the detail page.
    pub fn find_listing(pool: &DbPool, id: i64) -> Option<ProjectListing> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT p.*, a.agency_name, a.rating_average, a.subscription_tier
             FROM projects p
             JOIN agencies a ON p.agency_id = a.id
             WHERE p.id = ?1",
            params![id],
            Self::listing_from_row,
        )
        .ok()
    }

    /// Marketplace listing. Premium owners sort first, then newest.
    pub fn list(pool: &DbPool, filters: &ProjectFilters) -> Vec<ProjectListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let mut sql = String::from(
            "SELECT p.*, a.agency_name, a.rating_average, a.subscription_tier
             FROM projects p
             JOIN agencies a ON p.agency_id = a.id
             WHERE 1=1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filters.status {
            sql.push_str(&format!(" AND p.status = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(status.to_string()));
        }
        if let Some(ptype) = filters.project_type {
            sql.push_str(&format!(" AND p.project_type = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(ptype.to_string()));
        }
        if let Some(platform) = filters.platform {
            sql.push_str(&format!(" AND p.platforms_involved LIKE ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(format!("%{}%", platform)));
        }
        if let Some(agency_id) = filters.agency_id {
            sql.push_str(&format!(" AND p.agency_id = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(agency_id));
        }

        sql.push_str(" ORDER BY a.subscription_tier DESC, p.created_at DESC");

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        stmt.query_map(params_refs.as_slice(), Self::listing_from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_by_agency(pool: &DbPool, agency_id: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn
            .prepare("SELECT * FROM projects WHERE agency_id = ?1 ORDER BY created_at DESC")
        {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![agency_id], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool, status: Option<&str>) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        match status {
            Some(s) => conn
                .query_row(
                    "SELECT COUNT(*) FROM projects WHERE status = ?1",
                    params![s],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }

    pub fn update(pool: &DbPool, id: i64, form: &ProjectForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE projects SET title = ?1, description = ?2, project_type = ?3,
             platforms_involved = ?4, budget_range = ?5, deadline = ?6, hide_identity = ?7
             WHERE id = ?8",
            params![
                form.title,
                form.description,
                form.project_type,
                form.platforms_involved,
                form.budget_range,
                form.deadline,
                form.hide_identity.unwrap_or(false) as i64,
                id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn set_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE projects SET status = ?1 WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM projects WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn response_count(pool: &DbPool, id: i64) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM responses WHERE project_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    /// Whether the owner's identity may be shown to `viewer`.
    /// Public projects are always visible; hidden ones only to the owner,
    /// to admins, and to responders the owner has revealed to.
    pub fn identity_visible_to(
        &self,
        pool: &DbPool,
        viewer: Option<i64>,
        is_admin: bool,
    ) -> bool {
        if !self.hide_identity || is_admin {
            return true;
        }
        match viewer {
            Some(id) if id == self.agency_id => true,
            Some(id) => IdentityReveal::is_revealed(pool, self.id, id),
            None => false,
        }
    }
}
