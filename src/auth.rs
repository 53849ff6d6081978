use chrono::{Duration, Utc};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use rusqlite::params;
use sha2::{Digest, Sha256};

use crate::db::DbPool;
use crate::models::admin::AdminAccount;
use crate::models::agency::Agency;
use crate::models::settings::Setting;

const SESSION_COOKIE: &str = "minerva_session";

// ── Request guards ──

/// Real client IP: X-Real-IP, then the first X-Forwarded-For hop, then the
/// socket peer address.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        if let Some(ip) = headers.get_one("X-Real-IP") {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Outcome::Success(ClientIp(ip.to_string()));
            }
        }

        if let Some(forwarded) = headers.get_one("X-Forwarded-For") {
            if let Some(ip) = forwarded.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Outcome::Success(ClientIp(ip.to_string()));
                }
            }
        }

        let ip = request
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

/// Guard: any logged-in agency, whatever its approval status.
pub struct AgencyUser {
    pub agency: Agency,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AgencyUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session(request, "agency").await {
            Some(user_id) => {
                let pool = match request.guard::<&State<DbPool>>().await {
                    Outcome::Success(p) => p,
                    _ => return Outcome::Error((Status::Unauthorized, ())),
                };
                match Agency::find_by_id(pool, user_id) {
                    Some(agency) => Outcome::Success(AgencyUser { agency }),
                    None => {
                        request.cookies().remove_private(Cookie::from(SESSION_COOKIE));
                        Outcome::Error((Status::Unauthorized, ()))
                    }
                }
            }
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Guard: logged-in back-office admin.
pub struct AdminUser {
    pub admin: AdminAccount,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session(request, "admin").await {
            Some(user_id) => {
                let pool = match request.guard::<&State<DbPool>>().await {
                    Outcome::Success(p) => p,
                    _ => return Outcome::Error((Status::Unauthorized, ())),
                };
                match AdminAccount::find_by_id(pool, user_id) {
                    Some(admin) => Outcome::Success(AdminUser { admin }),
                    None => {
                        request.cookies().remove_private(Cookie::from(SESSION_COOKIE));
                        Outcome::Error((Status::Unauthorized, ()))
                    }
                }
            }
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Optional viewer identity for public pages that adapt to a session
/// (marketplace identity hiding). Never fails.
pub struct MaybeAgency(pub Option<Agency>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeAgency {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user_id = match resolve_session(request, "agency").await {
            Some(id) => id,
            None => return Outcome::Success(MaybeAgency(None)),
        };
        let pool = match request.guard::<&State<DbPool>>().await {
            Outcome::Success(p) => p,
            _ => return Outcome::Success(MaybeAgency(None)),
        };
        Outcome::Success(MaybeAgency(Agency::find_by_id(pool, user_id)))
    }
}

async fn resolve_session(request: &Request<'_>, user_type: &str) -> Option<i64> {
    let pool = request.guard::<&State<DbPool>>().await.succeeded()?;
    let session_id = request
        .cookies()
        .get_private(SESSION_COOKIE)?
        .value()
        .to_string();
    session_user(pool, &session_id, user_type)
}

// ── Password utilities ──

pub fn hash_password(password: &str) -> Result<String, String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// ── Session management ──

pub fn create_session(
    pool: &DbPool,
    user_type: &str,
    user_id: i64,
    ip: Option<&str>,
) -> Result<String, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;

    let expiry_hours = Setting::get_i64(pool, "session_expiry_hours").max(1);
    let session_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let expires = now + Duration::hours(expiry_hours);
    let ip_hash = ip.map(hash_ip);

    conn.execute(
        "INSERT INTO sessions (id, user_type, user_id, created_at, expires_at, ip_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![session_id, user_type, user_id, now, expires, ip_hash],
    )
    .map_err(|e| e.to_string())?;

    Ok(session_id)
}

/// Resolve a live session of the given type to its user id.
pub fn session_user(pool: &DbPool, session_id: &str, user_type: &str) -> Option<i64> {
    let conn = pool.get().ok()?;
    let now = Utc::now().naive_utc();
    conn.query_row(
        "SELECT user_id FROM sessions WHERE id = ?1 AND user_type = ?2 AND expires_at > ?3",
        params![session_id, user_type, now],
        |row| row.get(0),
    )
    .ok()
}

pub fn destroy_session(pool: &DbPool, session_id: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])
        .map_err(|e| e.to_string())?;
    Ok(())
}

pub fn cleanup_expired_sessions(pool: &DbPool) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let now = Utc::now().naive_utc();
    conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])
        .map_err(|e| e.to_string())?;
    Ok(())
}

// ── Cookie helpers ──

pub fn set_session_cookie(cookies: &CookieJar<'_>, session_id: &str) {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(rocket::http::SameSite::Strict);
    cookie.set_path("/");
    cookies.add_private(cookie);
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
}

pub fn session_cookie_value(cookies: &CookieJar<'_>) -> Option<String> {
    cookies.get_private(SESSION_COOKIE).map(|c| c.value().to_string())
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}
