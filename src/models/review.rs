use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone)]
pub struct Review {
    pub id: i64,
    pub reviewer_agency_id: i64,
    pub target_agency_id: i64,
    pub project_id: Option<i64>,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

/// Review joined with names for profile and admin pages.
#[derive(Debug, Serialize)]
pub struct ReviewListing {
    #[serde(flatten)]
    pub review: Review,
    pub reviewer_name: String,
    pub target_name: Option<String>,
    pub project_title: Option<String>,
}

impl Review {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Review {
            id: row.get("id")?,
            reviewer_agency_id: row.get("reviewer_agency_id")?,
            target_agency_id: row.get("target_agency_id")?,
            project_id: row.get("project_id")?,
            rating: row.get("rating")?,
            comment: row.get("comment")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(
        pool: &DbPool,
        reviewer_agency_id: i64,
        target_agency_id: i64,
        project_id: Option<i64>,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO reviews (reviewer_agency_id, target_agency_id, project_id, rating, comment)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![reviewer_agency_id, target_agency_id, project_id, rating, comment],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM reviews WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    /// One review per (reviewer, target, project).
    pub fn exists(
        pool: &DbPool,
        reviewer_agency_id: i64,
        target_agency_id: i64,
        project_id: i64,
    ) -> bool {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return false,
        };
        conn.query_row(
            "SELECT 1 FROM reviews
             WHERE reviewer_agency_id = ?1 AND target_agency_id = ?2 AND project_id = ?3",
            params![reviewer_agency_id, target_agency_id, project_id],
            |_| Ok(()),
        )
        .is_ok()
    }

    pub fn list_for_target(pool: &DbPool, target_agency_id: i64, limit: i64) -> Vec<ReviewListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT r.*, reviewer.agency_name AS reviewer_name, p.title AS project_title
             FROM reviews r
             JOIN agencies reviewer ON r.reviewer_agency_id = reviewer.id
             LEFT JOIN projects p ON r.project_id = p.id
             WHERE r.target_agency_id = ?1
             ORDER BY r.created_at DESC
             LIMIT ?2",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![target_agency_id, limit], |row| {
            Ok(ReviewListing {
                review: Self::from_row(row)?,
                reviewer_name: row.get("reviewer_name")?,
                target_name: None,
                project_title: row.get("project_title")?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn list_all(pool: &DbPool) -> Vec<ReviewListing> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT r.*, reviewer.agency_name AS reviewer_name,
                    target.agency_name AS target_name, p.title AS project_title
             FROM reviews r
             JOIN agencies reviewer ON r.reviewer_agency_id = reviewer.id
             JOIN agencies target ON r.target_agency_id = target.id
             LEFT JOIN projects p ON r.project_id = p.id
             ORDER BY r.created_at DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], |row| {
            Ok(ReviewListing {
                review: Self::from_row(row)?,
                reviewer_name: row.get("reviewer_name")?,
                target_name: row.get("target_name")?,
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
        conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM reviews WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
