use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Agency {
    pub id: i64,
    pub agency_name: String,
    pub contact_name: String,
    pub email: String,
    pub password_hash: String,
    pub website: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub skills: Option<String>,
    pub platforms: Option<String>,
    pub verticals: Option<String>,
    pub certifications: Option<String>,
    pub logo_url: Option<String>,
    pub subscription_tier: String,   // free, pro, premium
    pub subscription_status: String, // active, past_due, canceled
    pub rating_average: f64,
    pub rating_count: i64,
    pub badges: Option<String>,
    pub status: String, // pending, approved, rejected, banned
    pub projects_created_this_month: i64,
    pub responses_sent_this_month: i64,
    pub created_at: String,
}

/// Profile fields shared by registration and profile editing.
#[derive(Debug, Deserialize)]
pub struct AgencyProfileForm {
    pub agency_name: String,
    pub contact_name: String,
    pub website: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub skills: Option<String>,
    pub platforms: Option<String>,
    pub verticals: Option<String>,
    pub certifications: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgencyStats {
    pub projects: i64,
    pub responses: i64,
    pub reviews: i64,
}

/// The two per-month usage counters stored on the agency row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyCounter {
    ProjectsCreated,
    ResponsesSent,
}

impl MonthlyCounter {
    fn column(&self) -> &'static str {
        match self {
            MonthlyCounter::ProjectsCreated => "projects_created_this_month",
            MonthlyCounter::ResponsesSent => "responses_sent_this_month",
        }
    }
}

impl Agency {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Agency {
            id: row.get("id")?,
            agency_name: row.get("agency_name")?,
            contact_name: row.get("contact_name")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            website: row.get("website")?,
            location: row.get("location")?,
            description: row.get("description")?,
            skills: row.get("skills")?,
            platforms: row.get("platforms")?,
            verticals: row.get("verticals")?,
            certifications: row.get("certifications")?,
            logo_url: row.get("logo_url")?,
            subscription_tier: row.get("subscription_tier")?,
            subscription_status: row.get("subscription_status")?,
            rating_average: row.get("rating_average")?,
            rating_count: row.get("rating_count")?,
            badges: row.get("badges")?,
            status: row.get("status")?,
            projects_created_this_month: row.get("projects_created_this_month")?,
            responses_sent_this_month: row.get("responses_sent_this_month")?,
            created_at: row.get("created_at")?,
        })
    }

    // ── Lookups ──

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM agencies WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn find_by_email(pool: &DbPool, email: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM agencies WHERE email = ?1",
            params![email],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool, status: Option<&str>) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status {
            Some(s) => (
                "SELECT * FROM agencies WHERE status = ?1 ORDER BY created_at DESC".to_string(),
                vec![Box::new(s.to_string())],
            ),
            None => (
                "SELECT * FROM agencies ORDER BY created_at DESC".to_string(),
                vec![],
            ),
        };

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        stmt.query_map(params_refs.as_slice(), Self::from_row)
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
                    "SELECT COUNT(*) FROM agencies WHERE status = ?1",
                    params![s],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM agencies", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }

    // ── Create ──

    pub fn create(
        pool: &DbPool,
        form: &AgencyProfileForm,
        email: &str,
        password_hash: &str,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO agencies (
                agency_name, contact_name, email, password_hash, website, location,
                description, skills, platforms, verticals, certifications,
                subscription_tier, subscription_status, status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'free', 'active', 'pending')",
            params![
                form.agency_name,
                form.contact_name,
                email,
                password_hash,
                form.website,
                form.location,
                form.description,
                form.skills,
                form.platforms,
                form.verticals,
                form.certifications,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    // ── Updates ──

    pub fn update_profile(pool: &DbPool, id: i64, form: &AgencyProfileForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE agencies SET agency_name = ?1, contact_name = ?2, website = ?3,
             location = ?4, description = ?5, skills = ?6, platforms = ?7,
             verticals = ?8, certifications = ?9 WHERE id = ?10",
            params![
                form.agency_name,
                form.contact_name,
                form.website,
                form.location,
                form.description,
                form.skills,
                form.platforms,
                form.verticals,
                form.certifications,
                id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE agencies SET status = ?1 WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn update_subscription(pool: &DbPool, id: i64, tier: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE agencies SET subscription_tier = ?1, subscription_status = 'active' WHERE id = ?2",
            params![tier, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Atomic increment-and-check for a monthly counter. The increment only
    /// happens while the counter is below `limit` (-1 = unlimited), so two
    /// concurrent requests cannot both consume the last slot.
    pub fn try_increment_monthly(
        pool: &DbPool,
        id: i64,
        counter: MonthlyCounter,
        limit: i64,
    ) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let sql = format!(
            "UPDATE agencies SET {col} = {col} + 1
             WHERE id = ?1 AND (?2 = -1 OR {col} < ?2)",
            col = counter.column()
        );
        let changed = conn.execute(&sql, params![id, limit]).map_err(|e| e.to_string())?;
        Ok(changed == 1)
    }

    pub fn monthly_count(pool: &DbPool, id: i64, counter: MonthlyCounter) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        let sql = format!("SELECT {} FROM agencies WHERE id = ?1", counter.column());
        conn.query_row(&sql, params![id], |row| row.get(0)).unwrap_or(0)
    }

    pub fn reset_monthly_counters(pool: &DbPool) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE agencies SET projects_created_this_month = 0, responses_sent_this_month = 0",
            [],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Rating & badges ──

    /// Full recompute of the rating aggregates from the reviews table.
    /// Called on every review create and delete.
    pub fn recompute_rating(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let (avg, count): (Option<f64>, i64) = conn
            .query_row(
                "SELECT AVG(rating), COUNT(*) FROM reviews WHERE target_agency_id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE agencies SET rating_average = ?1, rating_count = ?2 WHERE id = ?3",
            params![avg.unwrap_or(0.0), count, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Re-evaluate the badge rules against the current aggregates and tier.
    /// Must run after `recompute_rating` so the aggregates are fresh.
    pub fn recompute_badges(pool: &DbPool, id: i64) -> Result<(), String> {
        let agency = Self::find_by_id(pool, id).ok_or_else(|| "agency not found".to_string())?;
        let mut badges: Vec<&str> = Vec::new();

        if agency.rating_count >= 10 && agency.rating_average >= 4.5 {
            badges.push("Top Collaborator");
        }
        if agency.subscription_tier == "premium" && agency.rating_average >= 4.5 {
            badges.push("Elite Member");
        }
        if agency.subscription_tier == "premium" {
            badges.push("Elite Partner");
        }

        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE agencies SET badges = ?1 WHERE id = ?2",
            params![badges.join(","), id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Delete ──

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM sessions WHERE user_type = 'agency' AND user_id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM agencies WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Helpers ──

    pub fn stats(pool: &DbPool, id: i64) -> AgencyStats {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return AgencyStats { projects: 0, responses: 0, reviews: 0 },
        };
        let count = |sql: &str| -> i64 {
            conn.query_row(sql, params![id], |row| row.get(0)).unwrap_or(0)
        };
        AgencyStats {
            projects: count("SELECT COUNT(*) FROM projects WHERE agency_id = ?1"),
            responses: count("SELECT COUNT(*) FROM responses WHERE responder_agency_id = ?1"),
            reviews: count("SELECT COUNT(*) FROM reviews WHERE target_agency_id = ?1"),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }

    pub fn badge_list(&self) -> Vec<String> {
        self.badges
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter(|b| !b.is_empty())
            .map(|b| b.to_string())
            .collect()
    }

    /// Version without password_hash for template contexts.
    pub fn safe_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "agency_name": self.agency_name,
            "contact_name": self.contact_name,
            "email": self.email,
            "website": self.website,
            "location": self.location,
            "description": self.description,
            "skills": self.skills,
            "platforms": self.platforms,
            "verticals": self.verticals,
            "certifications": self.certifications,
            "logo_url": self.logo_url,
            "subscription_tier": self.subscription_tier,
            "subscription_status": self.subscription_status,
            "rating_average": self.rating_average,
            "rating_count": self.rating_count,
            "badges": self.badge_list(),
            "status": self.status,
            "projects_created_this_month": self.projects_created_this_month,
            "responses_sent_this_month": self.responses_sent_this_month,
            "created_at": self.created_at,
        })
    }
}
