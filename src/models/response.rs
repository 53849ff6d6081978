use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone)]
pub struct ProjectResponse {
    pub id: i64,
    pub project_id: i64,
    pub responder_agency_id: i64,
    pub message: String,
    pub contact_email: String,
    pub created_at: String,
}

/// Response joined with the responder agency, for the owner's view.
#[derive(Debug, Serialize)]
pub struct ResponseListing {
    #[serde(flatten)]
    pub response: ProjectResponse,
    pub agency_name: String,
    pub rating_average: f64,
    pub website: Option<String>,
}

/// Response joined with project title, for the admin moderation view.
#[derive(Debug, Serialize)]
pub struct ResponseAdminListing {
    #[serde(flatten)]
    pub response: ProjectResponse,
    pub agency_name: String,
    pub project_title: String,
}

impl ProjectResponse {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(ProjectResponse {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            responder_agency_id: row.get("responder_agency_id")?,
            message: row.get("message")?,
            contact_email: row.get("contact_email")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(
        pool: &DbPool,
        project_id: i64,
        responder_agency_id: i64,
        message: &str,
        contact_email: &str,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO responses (project_id, responder_agency_id, message, contact_email)
             VALUES (?1, ?2, ?3, ?4)",
            params![project_id, responder_agency_id, message, contact_email],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM responses WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn list_for_project(pool: &DbPool, project_id: i64) -> Vec<ResponseListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT r.*, a.agency_name, a.rating_average, a.website
             FROM responses r
             JOIN agencies a ON r.responder_agency_id = a.id
             WHERE r.project_id = ?1
             ORDER BY r.created_at DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![project_id], |row| {
            Ok(ResponseListing {
                response: Self::from_row(row)?,
                agency_name: row.get("agency_name")?,
                rating_average: row.get("rating_average")?,
                website: row.get("website")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn list_all(pool: &DbPool) -> Vec<ResponseAdminListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT r.*, a.agency_name, p.title AS project_title
             FROM responses r
             JOIN agencies a ON r.responder_agency_id = a.id
             JOIN projects p ON r.project_id = p.id
             ORDER BY r.created_at DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], |row| {
            Ok(ResponseAdminListing {
                response: Self::from_row(row)?,
                agency_name: row.get("agency_name")?,
                project_title: row.get("project_title")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM responses WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
