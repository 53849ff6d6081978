use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AgencyUser;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::agency::{Agency, AgencyProfileForm};
use crate::models::message::Message;
use crate::models::project::Project;
use crate::models::review::Review;
use crate::models::settings::Setting;
use crate::plans;
use crate::routes::{blank_to_none, flash_json};

#[get("/dashboard")]
pub fn dashboard(
    user: AgencyUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let agency = &user.agency;
    let stats = Agency::stats(pool, agency.id);
    let limits = plans::effective_limits(pool, agency.id).ok();
    let badge = plans::plan_badge(pool, agency.id);
    let recent_projects: Vec<_> = Project::list_by_agency(pool, agency.id)
        .into_iter()
        .take(5)
        .collect();

    let context = json!({
        "title": "Dashboard",
        "agency": agency.safe_json(),
        "stats": stats,
        "limits": limits,
        "plan_badge": badge,
        "recent_projects": recent_projects,
        "unread_messages": Message::unread_count(pool, agency.id),
        "flash": flash_json(&flash),
    });
    Template::render("pages/dashboard", context)
}

#[derive(Debug, FromForm)]
pub struct ProfileForm {
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

#[get("/profile/edit")]
pub fn edit_profile_page(user: AgencyUser, flash: Option<FlashMessage<'_>>) -> Template {
    let context = json!({
        "title": "Edit Profile",
        "agency": user.agency.safe_json(),
        "flash": flash_json(&flash),
    });
    Template::render("pages/edit-profile", context)
}

#[post("/profile/edit", data = "<form>")]
pub fn edit_profile_submit(
    user: AgencyUser,
    pool: &State<DbPool>,
    form: Form<ProfileForm>,
) -> Flash<Redirect> {
    let back = Redirect::to("/profile/edit");

    if form.agency_name.trim().is_empty() || form.contact_name.trim().is_empty() {
        return Flash::error(back, "Agency name and contact name are required");
    }

    let profile = AgencyProfileForm {
        agency_name: form.agency_name.trim().to_string(),
        contact_name: form.contact_name.trim().to_string(),
        website: blank_to_none(form.website.clone()),
        location: blank_to_none(form.location.clone()),
        description: blank_to_none(form.description.clone()),
        skills: blank_to_none(form.skills.clone()),
        platforms: blank_to_none(form.platforms.clone()),
        verticals: blank_to_none(form.verticals.clone()),
        certifications: blank_to_none(form.certifications.clone()),
    };

    match Agency::update_profile(pool, user.agency.id, &profile) {
        Ok(()) => {
            ActivityEntry::log(pool, "profile_updated", Some(user.agency.id), json!({}));
            Flash::success(back, "Profile updated successfully")
        }
        Err(e) => {
            log::error!("profile update failed: {}", e);
            Flash::error(back, "Failed to update profile")
        }
    }
}

#[get("/agencies/<id>")]
pub fn public_profile(
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    let agency = Agency::find_by_id(pool, id)
        .filter(|a| a.is_approved())
        .ok_or_else(|| Flash::error(Redirect::to("/projects"), "Agency not found"))?;

    let review_limit = Setting::get_i64(pool, "reviews_per_profile").max(1);
    let reviews = Review::list_for_target(pool, id, review_limit);
    let open_projects: Vec<_> = Project::list_by_agency(pool, id)
        .into_iter()
        .filter(|p| p.status == "open")
        .collect();

    let context = json!({
        "title": agency.agency_name,
        "agency": agency.safe_json(),
        "reviews": reviews,
        "projects": open_projects,
        "badges": agency.badge_list(),
        "plan_badge": plans::plan_badge(pool, id),
        "flash": flash_json(&flash),
    });
    Ok(Template::render("pages/agency-profile", context))
}

/// Payment is a stub; a production deployment would hand off to the
/// billing provider's checkout here.
#[get("/subscriptions/checkout/<tier>")]
pub fn checkout_stub(_user: AgencyUser, tier: &str) -> Flash<Redirect> {
    if tier != "pro" && tier != "premium" {
        return Flash::error(Redirect::to("/dashboard"), "Unknown subscription tier");
    }
    Flash::warning(
        Redirect::to("/dashboard"),
        format!(
            "Checkout placeholder: upgrade to the {} tier would redirect to the payment provider.",
            tier
        ),
    )
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        dashboard,
        edit_profile_page,
        edit_profile_submit,
        public_profile,
        checkout_stub,
    ]
}
