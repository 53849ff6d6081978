use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

/// Internal inbox entry. `sender_id` 0 means system/admin.
#[derive(Debug, Serialize, Clone)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageListing {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: Option<String>,
}

impl Message {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let is_read: i64 = row.get("is_read")?;
        Ok(Message {
            id: row.get("id")?,
            sender_id: row.get("sender_id")?,
            recipient_id: row.get("recipient_id")?,
            subject: row.get("subject")?,
            body: row.get("body")?,
            is_read: is_read != 0,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(
        pool: &DbPool,
        sender_id: i64,
        recipient_id: i64,
        subject: &str,
        body: &str,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO messages (sender_id, recipient_id, subject, body, is_read)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![sender_id, recipient_id, subject, body],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<MessageListing> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT m.*, a.agency_name AS sender_name
             FROM messages m
             LEFT JOIN agencies a ON m.sender_id = a.id
             WHERE m.id = ?1",
            params![id],
            |row| {
                Ok(MessageListing {
                    message: Self::from_row(row)?,
                    sender_name: row.get("sender_name")?,
                })
            },
        )
        .ok()
    }

    pub fn list_for_recipient(pool: &DbPool, recipient_id: i64) -> Vec<MessageListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT m.*, a.agency_name AS sender_name
             FROM messages m
             LEFT JOIN agencies a ON m.sender_id = a.id
             WHERE m.recipient_id = ?1
             ORDER BY m.created_at DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![recipient_id], |row| {
            Ok(MessageListing {
                message: Self::from_row(row)?,
                sender_name: row.get("sender_name")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn unread_count(pool: &DbPool, recipient_id: i64) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
            params![recipient_id],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn mark_read(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("UPDATE messages SET is_read = 1 WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn mark_all_read(pool: &DbPool, recipient_id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE messages SET is_read = 1 WHERE recipient_id = ?1",
            params![recipient_id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Broadcast from the back office to every approved agency.
    /// Returns the number of recipients.
    pub fn send_to_all(pool: &DbPool, subject: &str, body: &str) -> Result<usize, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO messages (sender_id, recipient_id, subject, body, is_read)
             SELECT 0, id, ?1, ?2, 0 FROM agencies WHERE status = 'approved'",
            params![subject, body],
        )
        .map_err(|e| e.to_string())
    }

    /// Broadcast to approved agencies on the named plan tier.
    pub fn send_to_tier(pool: &DbPool, tier: &str, subject: &str, body: &str) -> Result<usize, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO messages (sender_id, recipient_id, subject, body, is_read)
             SELECT 0, id, ?2, ?3, 0 FROM agencies
             WHERE status = 'approved' AND subscription_tier = ?1 COLLATE NOCASE",
            params![tier, subject, body],
        )
        .map_err(|e| e.to_string())
    }
}
