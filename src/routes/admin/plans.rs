use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::plan::{Plan, PlanForm};
use crate::routes::{blank_to_none, flash_json};

#[get("/plans")]
pub fn list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "title": "Manage Plans",
        "plans": Plan::list_all(pool),
        "flash": flash_json(&flash),
    });
    Template::render("admin/plans", context)
}

#[derive(Debug, FromForm)]
pub struct PlanFormData {
    pub name: String,
    pub max_projects: i64,
    pub max_responses: i64,
    pub max_collabs: i64,
    pub max_messages: i64,
    pub highlight_label: Option<String>,
    pub highlight_badge_color: Option<String>,
    pub price: f64,
    pub description: Option<String>,
    pub is_default: Option<bool>,
}

fn validate_plan(form: &PlanFormData) -> Result<PlanForm, &'static str> {
    if form.name.trim().is_empty() {
        return Err("Plan name is required");
    }
    // -1 is the unlimited sentinel; anything lower is a typo.
    for limit in [form.max_projects, form.max_responses, form.max_collabs, form.max_messages] {
        if limit < -1 {
            return Err("Limits must be -1 (unlimited) or a non-negative count");
        }
    }
    if form.price < 0.0 {
        return Err("Price cannot be negative");
    }
    Ok(PlanForm {
        name: form.name.trim().to_string(),
        max_projects: form.max_projects,
        max_responses: form.max_responses,
        max_collabs: form.max_collabs,
        max_messages: form.max_messages,
        highlight_label: blank_to_none(form.highlight_label.clone()),
        highlight_badge_color: blank_to_none(form.highlight_badge_color.clone()),
        price: form.price,
        description: blank_to_none(form.description.clone()),
        is_default: form.is_default,
    })
}

#[post("/plans/create", data = "<form>")]
pub fn create(admin: AdminUser, pool: &State<DbPool>, form: Form<PlanFormData>) -> Flash<Redirect> {
    let back = Redirect::to("/admin/plans");

    let plan_form = match validate_plan(&form) {
        Ok(f) => f,
        Err(msg) => return Flash::error(back, msg),
    };

    match Plan::create(pool, &plan_form) {
        Ok(plan_id) => {
            ActivityEntry::log(
                pool,
                "plan_created",
                None,
                json!({ "admin_id": admin.admin.id, "plan_id": plan_id, "name": plan_form.name }),
            );
            Flash::success(back, "Plan created")
        }
        Err(e) => {
            log::error!("plan creation failed: {}", e);
            Flash::error(back, "Failed to create plan")
        }
    }
}

#[post("/plans/<id>/update", data = "<form>")]
pub fn update(
    admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<PlanFormData>,
) -> Flash<Redirect> {
    let back = Redirect::to("/admin/plans");

    if Plan::find_by_id(pool, id).is_none() {
        return Flash::error(back, "Plan not found");
    }
    let plan_form = match validate_plan(&form) {
        Ok(f) => f,
        Err(msg) => return Flash::error(back, msg),
    };

    match Plan::update(pool, id, &plan_form) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "plan_updated",
                None,
                json!({ "admin_id": admin.admin.id, "plan_id": id }),
            );
            Flash::success(back, "Plan updated")
        }
        Err(e) => {
            log::error!("plan update failed: {}", e);
            Flash::error(back, "Failed to update plan")
        }
    }
}

#[post("/plans/<id>/deactivate")]
pub fn deactivate(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    toggle(admin, pool, id, false)
}

#[post("/plans/<id>/activate")]
pub fn activate(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    toggle(admin, pool, id, true)
}

fn toggle(admin: AdminUser, pool: &DbPool, id: i64, active: bool) -> Flash<Redirect> {
    let back = Redirect::to("/admin/plans");
    match Plan::set_active(pool, id, active) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                if active { "plan_activated" } else { "plan_deactivated" },
                None,
                json!({ "admin_id": admin.admin.id, "plan_id": id }),
            );
            Flash::success(back, if active { "Plan activated" } else { "Plan deactivated" })
        }
        Err(e) => {
            log::error!("plan toggle failed: {}", e);
            Flash::error(back, "Failed to update plan")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, create, update, deactivate, activate]
}
