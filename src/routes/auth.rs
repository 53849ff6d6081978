use rocket::form::Form;
use rocket::http::CookieJar;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;
use std::time::Duration;

use crate::auth;
use crate::auth::ClientIp;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::agency::{Agency, AgencyProfileForm};
use crate::models::settings::Setting;
use crate::rate_limit::RateLimiter;
use crate::routes::{blank_to_none, flash_json, looks_like_email};

const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, FromForm)]
pub struct RegisterForm {
    pub agency_name: String,
    pub contact_name: String,
    pub email: String,
    pub password: String,
    pub website: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub skills: Option<String>,
    pub platforms: Option<String>,
    pub verticals: Option<String>,
}

#[derive(Debug, FromForm)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[get("/register")]
pub fn register_page(pool: &State<DbPool>, flash: Option<FlashMessage<'_>>) -> Template {
    let context = json!({
        "title": "Register Your Agency",
        "site_name": Setting::get_or(pool, "site_name", "Minerva Metrics Hub"),
        "flash": flash_json(&flash),
    });
    Template::render("pages/register", context)
}

#[post("/register", data = "<form>")]
pub fn register_submit(pool: &State<DbPool>, form: Form<RegisterForm>) -> Flash<Redirect> {
    let back = Redirect::to("/register");

    if form.agency_name.trim().is_empty() || form.contact_name.trim().is_empty() {
        return Flash::error(back, "Agency name and contact name are required");
    }
    if !looks_like_email(&form.email) {
        return Flash::error(back, "Valid email is required");
    }
    if form.password.len() < 6 {
        return Flash::error(back, "Password must be at least 6 characters");
    }

    let email = form.email.trim().to_lowercase();
    if Agency::find_by_email(pool, &email).is_some() {
        return Flash::error(back, "Email already registered");
    }

    let password_hash = match auth::hash_password(&form.password) {
        Ok(h) => h,
        Err(e) => {
            log::error!("registration failed hashing password: {}", e);
            return Flash::error(back, "Registration failed. Please try again.");
        }
    };

    let profile = AgencyProfileForm {
        agency_name: form.agency_name.trim().to_string(),
        contact_name: form.contact_name.trim().to_string(),
        website: blank_to_none(form.website.clone()),
        location: blank_to_none(form.location.clone()),
        description: blank_to_none(form.description.clone()),
        skills: blank_to_none(form.skills.clone()),
        platforms: blank_to_none(form.platforms.clone()),
        verticals: blank_to_none(form.verticals.clone()),
        certifications: None,
    };

    match Agency::create(pool, &profile, &email, &password_hash) {
        Ok(agency_id) => {
            ActivityEntry::log(
                pool,
                "agency_registered",
                Some(agency_id),
                json!({ "email": email, "agency_name": profile.agency_name }),
            );
            Flash::success(
                Redirect::to("/login"),
                "Registration successful! Your profile is pending approval.",
            )
        }
        Err(e) => {
            log::error!("registration failed: {}", e);
            Flash::error(back, "Registration failed. Please try again.")
        }
    }
}

#[get("/login")]
pub fn login_page(pool: &State<DbPool>, flash: Option<FlashMessage<'_>>) -> Template {
    let context = json!({
        "title": "Login",
        "site_name": Setting::get_or(pool, "site_name", "Minerva Metrics Hub"),
        "flash": flash_json(&flash),
    });
    Template::render("pages/login", context)
}

#[post("/login", data = "<form>")]
pub fn login_submit(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    cookies: &CookieJar<'_>,
    ip: ClientIp,
    form: Form<LoginForm>,
) -> Result<Redirect, Flash<Redirect>> {
    let back = || Redirect::to("/login");

    let max_attempts = Setting::get_i64(pool, "login_rate_limit").max(1) as u64;
    let rate_key = format!("login:{}", auth::hash_ip(&ip.0));
    if !limiter.check_and_record(&rate_key, max_attempts, LOGIN_WINDOW) {
        return Err(Flash::error(
            back(),
            "Too many login attempts. Please try again in 15 minutes.",
        ));
    }

    let email = form.email.trim().to_lowercase();
    let agency = match Agency::find_by_email(pool, &email) {
        Some(a) => a,
        None => return Err(Flash::error(back(), "Invalid email or password")),
    };

    if !auth::verify_password(&form.password, &agency.password_hash) {
        return Err(Flash::error(back(), "Invalid email or password"));
    }

    let session_id = auth::create_session(pool, "agency", agency.id, Some(&ip.0))
        .map_err(|e| {
            log::error!("session creation failed: {}", e);
            Flash::error(back(), "Login failed. Please try again.")
        })?;
    auth::set_session_cookie(cookies, &session_id);

    ActivityEntry::log(pool, "agency_login", Some(agency.id), json!({ "email": email }));

    Ok(Redirect::to("/dashboard"))
}

#[get("/logout")]
pub fn logout(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Redirect {
    if let Some(session_id) = auth::session_cookie_value(cookies) {
        let _ = auth::destroy_session(pool, &session_id);
    }
    auth::clear_session_cookie(cookies);
    Redirect::to("/")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![register_page, register_submit, login_page, login_submit, logout]
}
