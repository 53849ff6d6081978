use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

/// Back-office account. Separate table from agencies; admins have no
/// marketplace presence.
#[derive(Debug, Serialize, Clone)]
pub struct AdminAccount {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

impl AdminAccount {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(AdminAccount {
            id: row.get("id")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM admin_users WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn find_by_email(pool: &DbPool, email: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM admin_users WHERE email = ?1",
            params![email],
            Self::from_row,
        )
        .ok()
    }

    pub fn create(pool: &DbPool, email: &str, password_hash: &str) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO admin_users (email, password_hash) VALUES (?1, ?2)",
            params![email, password_hash],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }
}
