use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone)]
pub struct Ticket {
    pub id: i64,
    pub agency_id: i64,
    pub title: String,
    pub category: String,
    pub status: String, // open, in_progress, resolved, closed
    pub message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct TicketListing {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub agency_name: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct TicketResponse {
    pub id: i64,
    pub ticket_id: i64,
    pub user_type: String, // agency, admin
    pub user_id: i64,
    pub message: String,
    pub created_at: String,
}

pub const TICKET_STATUSES: &[&str] = &["open", "in_progress", "resolved", "closed"];

impl Ticket {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Ticket {
            id: row.get("id")?,
            agency_id: row.get("agency_id")?,
            title: row.get("title")?,
            category: row.get("category")?,
            status: row.get("status")?,
            message: row.get("message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn create(
        pool: &DbPool,
        agency_id: i64,
        title: &str,
        category: &str,
        message: &str,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO tickets (agency_id, title, category, status, message)
             VALUES (?1, ?2, ?3, 'open', ?4)",
            params![agency_id, title, category, message],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM tickets WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn list_by_agency(pool: &DbPool, agency_id: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn
            .prepare("SELECT * FROM tickets WHERE agency_id = ?1 ORDER BY created_at DESC")
        {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![agency_id], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_all(pool: &DbPool) -> Vec<TicketListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT t.*, a.agency_name FROM tickets t
             JOIN agencies a ON t.agency_id = a.id
             ORDER BY t.created_at DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], |row| {
            Ok(TicketListing {
                ticket: Self::from_row(row)?,
                agency_name: row.get("agency_name")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn count_open(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM tickets WHERE status = 'open'", [], |row| {
            row.get(0)
        })
        .unwrap_or(0)
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE tickets SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Removes the ticket and its thread.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM ticket_responses WHERE ticket_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM tickets WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

impl TicketResponse {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(TicketResponse {
            id: row.get("id")?,
            ticket_id: row.get("ticket_id")?,
            user_type: row.get("user_type")?,
            user_id: row.get("user_id")?,
            message: row.get("message")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(
        pool: &DbPool,
        ticket_id: i64,
        user_type: &str,
        user_id: i64,
        message: &str,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO ticket_responses (ticket_id, user_type, user_id, message)
             VALUES (?1, ?2, ?3, ?4)",
            params![ticket_id, user_type, user_id, message],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_for_ticket(pool: &DbPool, ticket_id: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn
            .prepare("SELECT * FROM ticket_responses WHERE ticket_id = ?1 ORDER BY created_at ASC")
        {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![ticket_id], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }
}
