use rocket::form::Form;
use rocket::http::CookieJar;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth;
use crate::auth::ClientIp;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::admin::AdminAccount;
use crate::models::settings::Setting;
use crate::rate_limit::RateLimiter;
use crate::routes::flash_json;

pub mod agencies;
pub mod dashboard;
pub mod messages;
pub mod moderation;
pub mod plans;
pub mod tickets;

#[derive(Debug, FromForm)]
pub struct AdminLoginForm {
    pub email: String,
    pub password: String,
}

#[get("/login")]
pub fn login_page(pool: &State<DbPool>, flash: Option<FlashMessage<'_>>) -> Template {
    let context = json!({
        "title": "Admin Login",
        "site_name": Setting::get_or(pool, "site_name", "Minerva Metrics Hub"),
        "flash": flash_json(&flash),
    });
    Template::render("admin/login", context)
}

#[post("/login", data = "<form>")]
pub fn login_submit(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    cookies: &CookieJar<'_>,
    ip: ClientIp,
    form: Form<AdminLoginForm>,
) -> Result<Redirect, Flash<Redirect>> {
    let back = || Redirect::to("/admin/login");

    let max_attempts = Setting::get_i64(pool, "login_rate_limit").max(1) as u64;
    let rate_key = format!("admin-login:{}", auth::hash_ip(&ip.0));
    if !limiter.check_and_record(&rate_key, max_attempts, std::time::Duration::from_secs(15 * 60)) {
        return Err(Flash::error(
            back(),
            "Too many login attempts. Please try again in 15 minutes.",
        ));
    }

    let admin = match AdminAccount::find_by_email(pool, form.email.trim()) {
        Some(a) => a,
        None => return Err(Flash::error(back(), "Invalid credentials")),
    };
    if !auth::verify_password(&form.password, &admin.password_hash) {
        return Err(Flash::error(back(), "Invalid credentials"));
    }

    let session_id = auth::create_session(pool, "admin", admin.id, Some(&ip.0)).map_err(|e| {
        log::error!("admin session creation failed: {}", e);
        Flash::error(back(), "Login failed")
    })?;
    auth::set_session_cookie(cookies, &session_id);

    ActivityEntry::log(pool, "admin_login", None, json!({ "admin_email": admin.email }));

    Ok(Redirect::to("/admin/dashboard"))
}

#[get("/logout")]
pub fn logout(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Redirect {
    if let Some(session_id) = auth::session_cookie_value(cookies) {
        let _ = auth::destroy_session(pool, &session_id);
    }
    auth::clear_session_cookie(cookies);
    Redirect::to("/admin/login")
}

pub fn routes() -> Vec<rocket::Route> {
    let mut all = routes![login_page, login_submit, logout];
    all.extend(dashboard::routes());
    all.extend(agencies::routes());
    all.extend(plans::routes());
    all.extend(moderation::routes());
    all.extend(tickets::routes());
    all.extend(messages::routes());
    all
}
