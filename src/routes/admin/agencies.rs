use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::agency::Agency;
use crate::models::plan::Plan;
use crate::models::user_override::{OverrideForm, UserOverride};
use crate::routes::{blank_to_none, flash_json};

const TIERS: &[&str] = &["free", "pro", "premium"];

#[get("/agencies?<status>")]
pub fn list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    status: Option<String>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let status_filter = status.as_deref().filter(|s| !s.is_empty());
    let agencies: Vec<_> = Agency::list(pool, status_filter)
        .iter()
        .map(|a| {
            let mut v = a.safe_json();
            v["override"] = json!(UserOverride::find_by_user(pool, a.id));
            v
        })
        .collect();

    let context = json!({
        "title": "Manage Agencies",
        "agencies": agencies,
        "plans": Plan::list_all(pool),
        "overrides": UserOverride::list_all(pool),
        "status_filter": status_filter,
        "tiers": TIERS,
        "flash": flash_json(&flash),
    });
    Template::render("admin/agencies", context)
}

fn set_status(
    admin: &AdminUser,
    pool: &DbPool,
    id: i64,
    status: &str,
    action: &str,
    ok_msg: &str,
    err_msg: &str,
) -> Flash<Redirect> {
    let back = Redirect::to("/admin/agencies");
    match Agency::update_status(pool, id, status) {
        Ok(()) => {
            ActivityEntry::log(pool, action, Some(id), json!({ "admin_id": admin.admin.id }));
            Flash::success(back, ok_msg)
        }
        Err(e) => {
            log::error!("{}: {}", err_msg, e);
            Flash::error(back, err_msg)
        }
    }
}

#[post("/agencies/<id>/approve")]
pub fn approve(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    set_status(&admin, pool, id, "approved", "agency_approved", "Agency approved", "Failed to approve agency")
}

#[post("/agencies/<id>/reject")]
pub fn reject(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    set_status(&admin, pool, id, "rejected", "agency_rejected", "Agency rejected", "Failed to reject agency")
}

#[post("/agencies/<id>/ban")]
pub fn ban(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    set_status(&admin, pool, id, "banned", "agency_banned", "Agency banned", "Failed to ban agency")
}

#[post("/agencies/<id>/unban")]
pub fn unban(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    set_status(&admin, pool, id, "approved", "agency_unbanned", "Agency unbanned", "Failed to unban agency")
}

#[post("/agencies/<id>/delete")]
pub fn delete(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = Redirect::to("/admin/agencies");
    match Agency::delete(pool, id) {
        Ok(()) => {
            ActivityEntry::log(pool, "agency_deleted", Some(id), json!({ "admin_id": admin.admin.id }));
            Flash::success(back, "Agency deleted successfully")
        }
        Err(e) => {
            log::error!("agency delete failed: {}", e);
            Flash::error(back, "Failed to delete agency")
        }
    }
}

#[derive(Debug, FromForm)]
pub struct SubscriptionForm {
    pub subscription_tier: String,
}

#[post("/agencies/<id>/subscription", data = "<form>")]
pub fn update_subscription(
    admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<SubscriptionForm>,
) -> Flash<Redirect> {
    let back = Redirect::to("/admin/agencies");

    let tier = form.subscription_tier.trim();
    if !TIERS.contains(&tier) {
        return Flash::error(back, "Unknown subscription tier");
    }

    let result = Agency::update_subscription(pool, id, tier)
        .and_then(|_| Agency::recompute_badges(pool, id));
    match result {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "subscription_updated",
                Some(id),
                json!({ "admin_id": admin.admin.id, "new_tier": tier }),
            );
            Flash::success(back, "Subscription updated")
        }
        Err(e) => {
            log::error!("subscription update failed: {}", e);
            Flash::error(back, "Failed to update subscription")
        }
    }
}

#[derive(Debug, FromForm)]
pub struct OverrideFormData {
    pub override_plan_id: Option<i64>,
    pub custom_max_projects: Option<i64>,
    pub custom_max_responses: Option<i64>,
    pub custom_max_messages: Option<i64>,
    pub custom_max_collabs: Option<i64>,
    pub custom_badge_label: Option<String>,
    pub custom_badge_color: Option<String>,
    pub admin_notes: Option<String>,
    pub expiration_date: Option<String>,
    pub is_permanent: Option<bool>,
}

#[post("/agencies/<id>/override", data = "<form>")]
pub fn upsert_override(
    admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<OverrideFormData>,
) -> Flash<Redirect> {
    let back = Redirect::to("/admin/agencies");

    if Agency::find_by_id(pool, id).is_none() {
        return Flash::error(back, "Agency not found");
    }
    if let Some(plan_id) = form.override_plan_id {
        if Plan::find_by_id(pool, plan_id).is_none() {
            return Flash::error(back, "Override plan not found");
        }
    }

    let override_form = OverrideForm {
        override_plan_id: form.override_plan_id,
        custom_max_projects: form.custom_max_projects,
        custom_max_responses: form.custom_max_responses,
        custom_max_messages: form.custom_max_messages,
        custom_max_collabs: form.custom_max_collabs,
        custom_badge_label: blank_to_none(form.custom_badge_label.clone()),
        custom_badge_color: blank_to_none(form.custom_badge_color.clone()),
        admin_notes: blank_to_none(form.admin_notes.clone()),
        expiration_date: blank_to_none(form.expiration_date.clone()),
        is_permanent: form.is_permanent,
    };

    match UserOverride::upsert(pool, id, &override_form) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "override_upserted",
                Some(id),
                json!({
                    "admin_id": admin.admin.id,
                    "override_plan_id": override_form.override_plan_id,
                    "is_permanent": override_form.is_permanent.unwrap_or(false),
                }),
            );
            Flash::success(back, "Limit override saved")
        }
        Err(e) => {
            log::error!("override upsert failed: {}", e);
            Flash::error(back, "Failed to save override")
        }
    }
}

#[post("/agencies/<id>/override/delete")]
pub fn delete_override(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = Redirect::to("/admin/agencies");
    match UserOverride::delete_for_user(pool, id) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "override_deleted",
                Some(id),
                json!({ "admin_id": admin.admin.id }),
            );
            Flash::success(back, "Limit override removed")
        }
        Err(e) => {
            log::error!("override delete failed: {}", e);
            Flash::error(back, "Failed to remove override")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        approve,
        reject,
        ban,
        unban,
        delete,
        update_subscription,
        upsert_override,
        delete_override,
    ]
}
