use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

/// Owner consent to disclose their identity to one responder of a hidden
/// project. Rows are only ever created or flipped to revealed; there is no
/// un-reveal.
pub struct IdentityReveal;

/// Reveal joined with the responder agency, for the owner's responses page.
#[derive(Debug, Serialize)]
pub struct RevealListing {
    pub project_id: i64,
    pub responder_agency_id: i64,
    pub agency_name: String,
    pub email: String,
    pub created_at: String,
}

impl IdentityReveal {
    /// Idempotent: granting twice leaves exactly one row with revealed = 1.
    pub fn grant(pool: &DbPool, project_id: i64, responder_agency_id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO project_identity_reveals (project_id, responder_agency_id)
             VALUES (?1, ?2)
             ON CONFLICT(project_id, responder_agency_id) DO UPDATE SET revealed = 1",
            params![project_id, responder_agency_id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn is_revealed(pool: &DbPool, project_id: i64, responder_agency_id: i64) -> bool {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return false,
        };
        conn.query_row(
            "SELECT revealed FROM project_identity_reveals
             WHERE project_id = ?1 AND responder_agency_id = ?2",
            params![project_id, responder_agency_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|v| v == 1)
        .unwrap_or(false)
    }

    pub fn list_for_project(pool: &DbPool, project_id: i64) -> Vec<RevealListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT pir.project_id, pir.responder_agency_id, pir.created_at,
                    a.agency_name, a.email
             FROM project_identity_reveals pir
             JOIN agencies a ON pir.responder_agency_id = a.id
             WHERE pir.project_id = ?1",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![project_id], |row| {
            Ok(RevealListing {
                project_id: row.get("project_id")?,
                responder_agency_id: row.get("responder_agency_id")?,
                agency_name: row.get("agency_name")?,
                email: row.get("email")?,
                created_at: row.get("created_at")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}
