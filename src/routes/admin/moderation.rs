use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::agency::Agency;
use crate::models::project::{Project, ProjectFilters};
use crate::models::response::ProjectResponse;
use crate::models::review::Review;
use crate::routes::flash_json;

// ── Projects ──

#[get("/projects")]
pub fn projects_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let projects = Project::list(pool, &ProjectFilters::default());
    let context = json!({
        "title": "Manage Projects",
        "projects": projects,
        "flash": flash_json(&flash),
    });
    Template::render("admin/projects", context)
}

#[post("/projects/<id>/close")]
pub fn close_project(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = Redirect::to("/admin/projects");
    match Project::set_status(pool, id, "closed") {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "project_closed_by_admin",
                None,
                json!({ "admin_id": admin.admin.id, "project_id": id }),
            );
            Flash::success(back, "Project closed")
        }
        Err(e) => {
            log::error!("admin project close failed: {}", e);
            Flash::error(back, "Failed to close project")
        }
    }
}

// ── Responses ──

#[get("/responses")]
pub fn responses_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "title": "Manage Responses",
        "responses": ProjectResponse::list_all(pool),
        "flash": flash_json(&flash),
    });
    Template::render("admin/responses", context)
}

#[post("/responses/<id>/delete")]
pub fn delete_response(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = Redirect::to("/admin/responses");
    match ProjectResponse::delete(pool, id) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "response_deleted_by_admin",
                None,
                json!({ "admin_id": admin.admin.id, "response_id": id }),
            );
            Flash::success(back, "Response deleted")
        }
        Err(e) => {
            log::error!("admin response delete failed: {}", e);
            Flash::error(back, "Failed to delete response")
        }
    }
}

// ── Reviews ──

#[get("/reviews")]
pub fn reviews_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "title": "Manage Reviews",
        "reviews": Review::list_all(pool),
        "flash": flash_json(&flash),
    });
    Template::render("admin/reviews", context)
}

#[post("/reviews/<id>/delete")]
pub fn delete_review(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = Redirect::to("/admin/reviews");

    // Need the target before the row is gone so the aggregates can follow.
    let review = Review::find_by_id(pool, id);

    if let Err(e) = Review::delete(pool, id) {
        log::error!("admin review delete failed: {}", e);
        return Flash::error(back, "Failed to delete review");
    }

    if let Some(review) = review {
        if let Err(e) = Agency::recompute_rating(pool, review.target_agency_id)
            .and_then(|_| Agency::recompute_badges(pool, review.target_agency_id))
        {
            log::error!(
                "rating recompute failed for agency {}: {}",
                review.target_agency_id,
                e
            );
        }
    }

    ActivityEntry::log(
        pool,
        "review_deleted_by_admin",
        None,
        json!({ "admin_id": admin.admin.id, "review_id": id }),
    );

    Flash::success(back, "Review deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        projects_list,
        close_project,
        responses_list,
        delete_response,
        reviews_list,
        delete_review,
    ]
}
