use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::{self, AdminUser};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::agency::Agency;
use crate::models::contact::ContactMessage;
use crate::models::project::Project;
use crate::models::response::ProjectResponse;
use crate::models::review::Review;
use crate::models::settings::Setting;
use crate::models::ticket::Ticket;
use crate::models::user_override::UserOverride;
use crate::routes::flash_json;

#[get("/dashboard")]
pub fn dashboard(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let feed_size = Setting::get_i64(pool, "activity_feed_size").max(1);

    let stats = json!({
        "agencies": Agency::count(pool, None),
        "pending_agencies": Agency::count(pool, Some("pending")),
        "projects": Project::count(pool, None),
        "open_projects": Project::count(pool, Some("open")),
        "responses": ProjectResponse::count(pool),
        "reviews": Review::count(pool),
        "contact_messages": ContactMessage::unread_count(pool),
        "open_tickets": Ticket::count_open(pool),
    });

    let context = json!({
        "title": "Admin Dashboard",
        "stats": stats,
        "recent_activity": ActivityEntry::recent(pool, feed_size),
        "flash": flash_json(&flash),
    });
    Template::render("admin/dashboard", context)
}

/// Production drives this from cron at the month boundary; the button exists
/// so operators can run the rollover by hand.
#[post("/maintenance/reset-counters")]
pub fn reset_counters(_admin: AdminUser, pool: &State<DbPool>) -> Flash<Redirect> {
    let back = Redirect::to("/admin/dashboard");
    match Agency::reset_monthly_counters(pool) {
        Ok(()) => {
            ActivityEntry::log(pool, "monthly_counters_reset", None, json!({}));
            Flash::success(back, "Monthly usage counters reset.")
        }
        Err(e) => {
            log::error!("counter reset failed: {}", e);
            Flash::error(back, "Failed to reset counters.")
        }
    }
}

#[post("/maintenance/sweep-overrides")]
pub fn sweep_overrides(_admin: AdminUser, pool: &State<DbPool>) -> Flash<Redirect> {
    let back = Redirect::to("/admin/dashboard");
    match UserOverride::sweep_expired(pool) {
        Ok(removed) => {
            ActivityEntry::log(pool, "overrides_swept", None, json!({ "removed": removed }));
            Flash::success(back, format!("Removed {} expired override(s).", removed))
        }
        Err(e) => {
            log::error!("override sweep failed: {}", e);
            Flash::error(back, "Failed to sweep overrides.")
        }
    }
}

#[post("/maintenance/cleanup-sessions")]
pub fn cleanup_sessions(_admin: AdminUser, pool: &State<DbPool>) -> Flash<Redirect> {
    let back = Redirect::to("/admin/dashboard");
    match auth::cleanup_expired_sessions(pool) {
        Ok(()) => Flash::success(back, "Expired sessions removed."),
        Err(e) => {
            log::error!("session cleanup failed: {}", e);
            Flash::error(back, "Failed to clean up sessions.")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![dashboard, reset_counters, sweep_overrides, cleanup_sessions]
}
