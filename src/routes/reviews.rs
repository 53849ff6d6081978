use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AgencyUser;
use crate::db::DbPool;
use crate::models::activity::ActivityEntry;
use crate::models::agency::Agency;
use crate::models::review::Review;
use crate::routes::flash_json;

#[get("/reviews/create?<target>&<project>")]
pub fn create_page(
    user: AgencyUser,
    pool: &State<DbPool>,
    target: Option<i64>,
    project: Option<i64>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    if !user.agency.is_approved() {
        return Err(Flash::error(
            Redirect::to("/dashboard"),
            "Your account is pending approval",
        ));
    }

    let target_id = target.ok_or_else(|| {
        Flash::error(Redirect::to("/projects"), "Target agency not specified")
    })?;
    let target_agency = Agency::find_by_id(pool, target_id)
        .ok_or_else(|| Flash::error(Redirect::to("/projects"), "Agency not found"))?;

    if let Some(project_id) = project {
        if Review::exists(pool, user.agency.id, target_id, project_id) {
            return Err(Flash::error(
                Redirect::to(format!("/agencies/{}", target_id)),
                "You have already reviewed this agency for this project",
            ));
        }
    }

    let context = json!({
        "title": format!("Review {}", target_agency.agency_name),
        "target_agency": target_agency.safe_json(),
        "project_id": project,
        "flash": flash_json(&flash),
    });
    Ok(Template::render("pages/create-review", context))
}

#[derive(Debug, FromForm)]
pub struct ReviewFormData {
    pub target_agency_id: i64,
    pub project_id: Option<i64>,
    pub rating: i64,
    pub comment: Option<String>,
}

#[post("/reviews/create", data = "<form>")]
pub fn create_submit(
    user: AgencyUser,
    pool: &State<DbPool>,
    form: Form<ReviewFormData>,
) -> Flash<Redirect> {
    if !user.agency.is_approved() {
        return Flash::error(Redirect::to("/dashboard"), "Your account is pending approval");
    }

    let target_id = form.target_agency_id;
    if target_id == user.agency.id {
        return Flash::error(Redirect::to("/projects"), "You cannot review your own agency");
    }
    if !(1..=5).contains(&form.rating) {
        return Flash::error(Redirect::to("/projects"), "Rating must be between 1 and 5");
    }
    if Agency::find_by_id(pool, target_id).is_none() {
        return Flash::error(Redirect::to("/projects"), "Agency not found");
    }

    if let Some(project_id) = form.project_id {
        if Review::exists(pool, user.agency.id, target_id, project_id) {
            return Flash::error(
                Redirect::to(format!("/agencies/{}", target_id)),
                "You have already reviewed this agency for this project",
            );
        }
    }

    let comment = form.comment.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let review_id = match Review::create(
        pool,
        user.agency.id,
        target_id,
        form.project_id,
        form.rating,
        comment,
    ) {
        Ok(id) => id,
        Err(e) => {
            // The UNIQUE constraint also backstops duplicate submissions.
            log::error!("review creation failed: {}", e);
            return Flash::error(Redirect::to("/projects"), "Failed to submit review");
        }
    };

    // Derived aggregates are recomputed in full on every review mutation.
    if let Err(e) = Agency::recompute_rating(pool, target_id)
        .and_then(|_| Agency::recompute_badges(pool, target_id))
    {
        log::error!("rating recompute failed for agency {}: {}", target_id, e);
    }

    ActivityEntry::log(
        pool,
        "review_created",
        Some(user.agency.id),
        json!({ "review_id": review_id, "target_agency_id": target_id, "rating": form.rating }),
    );

    Flash::success(
        Redirect::to(format!("/agencies/{}", target_id)),
        "Review submitted successfully",
    )
}

#[get("/reviews/my")]
pub fn my_reviews(
    user: AgencyUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let reviews = Review::list_for_target(pool, user.agency.id, i64::MAX);
    let context = json!({
        "title": "Reviews Received",
        "agency": user.agency.safe_json(),
        "reviews": reviews,
        "flash": flash_json(&flash),
    });
    Template::render("pages/my-reviews", context)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![create_page, create_submit, my_reviews]
}
