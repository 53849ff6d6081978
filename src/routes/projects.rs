use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::{AgencyUser, MaybeAgency};
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::project::{Project, ProjectFilters, ProjectForm, ProjectListing, PROJECT_TYPES};
use crate::models::response::ProjectResponse;
use crate::models::reveal::IdentityReveal;
use crate::plans::{self, LimitAction};
use crate::routes::{blank_to_none, flash_json, looks_like_email};

const HIDDEN_AGENCY_NAME: &str = "Agency Hidden";
const HIDDEN_AGENCY_LOGO: &str = "/static/img/placeholder-logo.png";

/// Listing with the identity-hiding policy applied for this viewer.
fn listing_json(
    pool: &DbPool,
    listing: &ProjectListing,
    viewer: Option<i64>,
    is_admin: bool,
) -> serde_json::Value {
    let visible = listing.project.identity_visible_to(pool, viewer, is_admin);
    let mut value = json!({
        "project": listing.project,
        "is_hidden": !visible,
    });
    if visible {
        value["agency_name"] = json!(listing.agency_name);
        value["agency_id"] = json!(listing.project.agency_id);
        value["rating_average"] = json!(listing.rating_average);
    } else {
        value["agency_name"] = json!(HIDDEN_AGENCY_NAME);
        value["agency_id"] = serde_json::Value::Null;
        value["logo_url"] = json!(HIDDEN_AGENCY_LOGO);
    }
    value
}

#[get("/projects?<platform>&<type>")]
pub fn marketplace(
    pool: &State<DbPool>,
    viewer: MaybeAgency,
    platform: Option<String>,
    r#type: Option<String>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let filters = ProjectFilters {
        status: Some("open"),
        project_type: r#type.as_deref().filter(|t| !t.is_empty()),
        platform: platform.as_deref().filter(|p| !p.is_empty()),
        agency_id: None,
    };
    let viewer_id = viewer.0.as_ref().map(|a| a.id);
    let projects: Vec<_> = Project::list(pool, &filters)
        .iter()
        .map(|p| listing_json(pool, p, viewer_id, false))
        .collect();

    let context = json!({
        "title": "Project Marketplace",
        "projects": projects,
        "project_types": PROJECT_TYPES,
        "selected_platform": platform.unwrap_or_default(),
        "selected_type": r#type.unwrap_or_default(),
        "flash": flash_json(&flash),
    });
    Template::render("pages/projects", context)
}

#[get("/projects/<id>", rank = 2)]
pub fn project_detail(
    pool: &State<DbPool>,
    viewer: MaybeAgency,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    let listing = Project::find_listing(pool, id)
        .ok_or_else(|| Flash::error(Redirect::to("/projects"), "Project not found"))?;

    let viewer_id = viewer.0.as_ref().map(|a| a.id);
    let is_owner = viewer_id == Some(listing.project.agency_id);
    let response_count = Project::response_count(pool, id);

    // Only the owner sees the response list, annotated with reveal state.
    let responses: Vec<serde_json::Value> = if is_owner {
        ProjectResponse::list_for_project(pool, id)
            .into_iter()
            .map(|r| {
                let revealed = IdentityReveal::is_revealed(pool, id, r.response.responder_agency_id);
                json!({ "response": r, "is_revealed": revealed })
            })
            .collect()
    } else {
        vec![]
    };

    let context = json!({
        "title": listing.project.title,
        "project": listing_json(pool, &listing, viewer_id, false),
        "hide_identity": listing.project.hide_identity,
        "is_owner": is_owner,
        "responses": responses,
        "response_count": response_count,
        "flash": flash_json(&flash),
    });
    Ok(Template::render("pages/project-detail", context))
}

#[get("/projects/create", rank = 1)]
pub fn create_page(
    user: AgencyUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    if !user.agency.is_approved() {
        return Err(Flash::error(
            Redirect::to("/dashboard"),
            "Your account is pending approval",
        ));
    }

    let context = json!({
        "title": "Create Project",
        "agency": user.agency.safe_json(),
        "project_types": PROJECT_TYPES,
        "limits": plans::effective_limits(pool, user.agency.id).ok(),
        "flash": flash_json(&flash),
    });
    Ok(Template::render("pages/create-project", context))
}

#[derive(Debug, FromForm)]
pub struct ProjectFormData {
    pub title: String,
    pub description: String,
    pub project_type: String,
    pub platforms_involved: Option<String>,
    pub budget_range: Option<String>,
    pub deadline: Option<String>,
    pub hide_identity: Option<bool>,
}

fn validate_project(form: &ProjectFormData) -> Result<ProjectForm, &'static str> {
    if form.title.trim().is_empty() {
        return Err("Project title is required");
    }
    if form.description.trim().is_empty() {
        return Err("Project description is required");
    }
    if !PROJECT_TYPES.contains(&form.project_type.as_str()) {
        return Err("Invalid project type");
    }
    Ok(ProjectForm {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        project_type: form.project_type.clone(),
        platforms_involved: blank_to_none(form.platforms_involved.clone()),
        budget_range: blank_to_none(form.budget_range.clone()),
        deadline: blank_to_none(form.deadline.clone()),
        hide_identity: form.hide_identity,
    })
}

#[post("/projects/create", data = "<form>")]
pub fn create_submit(
    user: AgencyUser,
    pool: &State<DbPool>,
    form: Form<ProjectFormData>,
) -> Flash<Redirect> {
    let back = Redirect::to("/projects/create");

    if !user.agency.is_approved() {
        return Flash::error(Redirect::to("/dashboard"), "Your account is pending approval");
    }

    let project_form = match validate_project(&form) {
        Ok(f) => f,
        Err(msg) => return Flash::error(back, msg),
    };

    // Atomic limit check + counter consume; denial means the slot was gone.
    match plans::try_consume(pool, user.agency.id, LimitAction::CreateProject) {
        Ok(decision) if !decision.allowed => {
            let reason = decision
                .reason
                .unwrap_or_else(|| "You have reached the limit of your current plan.".to_string());
            return Flash::error(back, reason);
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("project limit check failed: {}", e);
            return Flash::error(back, "Failed to create project");
        }
    }

    match Project::create(pool, user.agency.id, &project_form) {
        Ok(project_id) => {
            ActivityEntry::log(
                pool,
                "project_created",
                Some(user.agency.id),
                json!({ "project_id": project_id, "title": project_form.title }),
            );
            Flash::success(
                Redirect::to(format!("/projects/{}", project_id)),
                "Project created successfully",
            )
        }
        Err(e) => {
            log::error!("project creation failed: {}", e);
            Flash::error(back, "Failed to create project")
        }
    }
}

#[get("/projects/my", rank = 1)]
pub fn my_projects(
    user: AgencyUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let projects = Project::list_by_agency(pool, user.agency.id);
    let context = json!({
        "title": "My Projects",
        "projects": projects,
        "flash": flash_json(&flash),
    });
    Template::render("pages/my-projects", context)
}

#[get("/projects/<id>/responses")]
pub fn project_responses(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    let project = Project::find_by_id(pool, id)
        .filter(|p| p.agency_id == user.agency.id)
        .ok_or_else(|| Flash::error(Redirect::to("/projects/my"), "Access denied"))?;

    let responses: Vec<serde_json::Value> = ProjectResponse::list_for_project(pool, id)
        .into_iter()
        .map(|r| {
            let revealed = IdentityReveal::is_revealed(pool, id, r.response.responder_agency_id);
            json!({ "response": r, "is_revealed": revealed })
        })
        .collect();

    let context = json!({
        "title": format!("Responses: {}", project.title),
        "project": project,
        "responses": responses,
        "reveals": IdentityReveal::list_for_project(pool, id),
        "flash": flash_json(&flash),
    });
    Ok(Template::render("pages/project-responses", context))
}

#[derive(Debug, FromForm)]
pub struct ResponseFormData {
    pub message: String,
    pub contact_email: String,
}

#[post("/projects/<id>/respond", data = "<form>")]
pub fn respond_submit(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<ResponseFormData>,
) -> Flash<Redirect> {
    let detail = Redirect::to(format!("/projects/{}", id));

    if !user.agency.is_approved() {
        return Flash::error(Redirect::to("/dashboard"), "Your account is pending approval");
    }

    let project = match Project::find_by_id(pool, id) {
        Some(p) => p,
        None => return Flash::error(Redirect::to("/projects"), "Project not found"),
    };
    if project.agency_id == user.agency.id {
        return Flash::error(detail, "You cannot respond to your own project");
    }
    if form.message.trim().is_empty() {
        return Flash::error(detail, "Message is required");
    }
    if !looks_like_email(&form.contact_email) {
        return Flash::error(detail, "Valid email is required");
    }

    match plans::try_consume(pool, user.agency.id, LimitAction::SendResponse) {
        Ok(decision) if !decision.allowed => {
            let reason = decision
                .reason
                .unwrap_or_else(|| "You have reached the limit of your current plan.".to_string());
            return Flash::error(
                Redirect::to(format!("/projects/{}?show_upgrade=true", id)),
                reason,
            );
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("response limit check failed: {}", e);
            return Flash::error(detail, "Failed to submit response");
        }
    }

    match ProjectResponse::create(
        pool,
        id,
        user.agency.id,
        form.message.trim(),
        form.contact_email.trim(),
    ) {
        Ok(_) => {
            ActivityEntry::log(
                pool,
                "response_sent",
                Some(user.agency.id),
                json!({ "project_id": id, "project_title": project.title }),
            );
            Flash::success(detail, "Response sent successfully")
        }
        Err(e) => {
            log::error!("response submission failed: {}", e);
            Flash::error(detail, "Failed to submit response")
        }
    }
}

#[get("/projects/<id>/edit")]
pub fn edit_page(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    let project = Project::find_by_id(pool, id)
        .filter(|p| p.agency_id == user.agency.id)
        .ok_or_else(|| Flash::error(Redirect::to("/projects/my"), "Access denied"))?;

    let context = json!({
        "title": "Edit Project",
        "project": project,
        "project_types": PROJECT_TYPES,
        "flash": flash_json(&flash),
    });
    Ok(Template::render("pages/edit-project", context))
}

#[post("/projects/<id>/update", data = "<form>")]
pub fn update_submit(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<ProjectFormData>,
) -> Flash<Redirect> {
    let project = match Project::find_by_id(pool, id) {
        Some(p) if p.agency_id == user.agency.id => p,
        _ => return Flash::error(Redirect::to("/projects/my"), "Access denied"),
    };

    let project_form = match validate_project(&form) {
        Ok(f) => f,
        Err(msg) => return Flash::error(Redirect::to(format!("/projects/{}/edit", id)), msg),
    };

    match Project::update(pool, project.id, &project_form) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "project_updated",
                Some(user.agency.id),
                json!({ "project_id": id, "title": project_form.title }),
            );
            Flash::success(
                Redirect::to(format!("/projects/{}", id)),
                "Project updated successfully",
            )
        }
        Err(e) => {
            log::error!("project update failed: {}", e);
            Flash::error(
                Redirect::to(format!("/projects/{}/edit", id)),
                "Failed to update project",
            )
        }
    }
}

#[post("/projects/<id>/close")]
pub fn close_submit(user: AgencyUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = Redirect::to("/projects/my");

    let project = match Project::find_by_id(pool, id) {
        Some(p) if p.agency_id == user.agency.id => p,
        _ => return Flash::error(back, "Access denied"),
    };

    match Project::set_status(pool, project.id, "closed") {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "project_closed",
                Some(user.agency.id),
                json!({ "project_id": id }),
            );
            Flash::success(back, "Project closed successfully")
        }
        Err(e) => {
            log::error!("project close failed: {}", e);
            Flash::error(back, "Failed to close project")
        }
    }
}

#[post("/projects/<id>/reveal/<responder_id>")]
pub fn reveal_identity(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
    responder_id: i64,
) -> Flash<Redirect> {
    let responses_page = Redirect::to(format!("/projects/{}/responses", id));

    let project = match Project::find_by_id(pool, id) {
        Some(p) if p.agency_id == user.agency.id => p,
        _ => return Flash::error(Redirect::to("/projects/my"), "Access denied"),
    };

    if !project.hide_identity {
        return Flash::error(responses_page, "Identity is already public for this project.");
    }

    match IdentityReveal::grant(pool, id, responder_id) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "identity_revealed",
                Some(user.agency.id),
                json!({ "project_id": id, "responder_agency_id": responder_id }),
            );
            Flash::success(responses_page, "Identity revealed to the selected agency.")
        }
        Err(e) => {
            log::error!("identity reveal failed: {}", e);
            Flash::error(responses_page, "Failed to reveal identity.")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        marketplace,
        project_detail,
        create_page,
        create_submit,
        my_projects,
        project_responses,
        respond_submit,
        edit_page,
        update_submit,
        close_submit,
        reveal_identity,
    ]
}
