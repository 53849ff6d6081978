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
use crate::models::ticket::{Ticket, TicketResponse, TICKET_STATUSES};
use crate::routes::flash_json;

#[get("/tickets")]
pub fn list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "title": "Manage Tickets",
        "tickets": Ticket::list_all(pool),
        "flash": flash_json(&flash),
    });
    Template::render("admin/tickets", context)
}

#[get("/tickets/<id>")]
pub fn view(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    let ticket = Ticket::find_by_id(pool, id)
        .ok_or_else(|| Flash::error(Redirect::to("/admin/tickets"), "Ticket not found."))?;

    let agency = Agency::find_by_id(pool, ticket.agency_id);
    let context = json!({
        "title": format!("Ticket #{}", ticket.id),
        "ticket": ticket,
        "responses": TicketResponse::list_for_ticket(pool, id),
        "agency": agency.map(|a| a.safe_json()),
        "statuses": TICKET_STATUSES,
        "flash": flash_json(&flash),
    });
    Ok(Template::render("admin/view-ticket", context))
}

#[derive(Debug, FromForm)]
pub struct StatusForm {
    pub status: String,
}

#[post("/tickets/<id>/status", data = "<form>")]
pub fn update_status(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<StatusForm>,
) -> Flash<Redirect> {
    let thread = Redirect::to(format!("/admin/tickets/{}", id));

    let status = form.status.trim();
    if !TICKET_STATUSES.contains(&status) {
        return Flash::error(thread, "Unknown ticket status");
    }

    match Ticket::update_status(pool, id, status) {
        Ok(()) => Flash::success(thread, format!("Ticket #{} status updated to {}.", id, status)),
        Err(e) => {
            log::error!("ticket status update failed: {}", e);
            Flash::error(thread, "Failed to update ticket status")
        }
    }
}

#[derive(Debug, FromForm)]
pub struct ReplyForm {
    pub message: String,
}

#[post("/tickets/<id>/respond", data = "<form>")]
pub fn respond(
    admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<ReplyForm>,
) -> Flash<Redirect> {
    let thread = Redirect::to(format!("/admin/tickets/{}", id));

    let ticket = match Ticket::find_by_id(pool, id) {
        Some(t) => t,
        None => return Flash::error(Redirect::to("/admin/tickets"), "Ticket not found."),
    };
    if form.message.trim().is_empty() {
        return Flash::error(thread, "Message is required.");
    }

    if let Err(e) = TicketResponse::create(pool, id, "admin", admin.admin.id, form.message.trim()) {
        log::error!("admin ticket response failed: {}", e);
        return Flash::error(thread, "Failed to send response");
    }

    // First staff touch moves the ticket out of the open queue.
    if ticket.status == "open" {
        if let Err(e) = Ticket::update_status(pool, id, "in_progress") {
            log::error!("ticket status bump failed: {}", e);
        }
    }

    Flash::success(thread, "Response sent.")
}

#[post("/tickets/<id>/delete")]
pub fn delete(admin: AdminUser, pool: &State<DbPool>, id: i64) -> Flash<Redirect> {
    let back = Redirect::to("/admin/tickets");
    match Ticket::delete(pool, id) {
        Ok(()) => {
            ActivityEntry::log(
                pool,
                "ticket_deleted_by_admin",
                None,
                json!({ "admin_id": admin.admin.id, "ticket_id": id }),
            );
            Flash::success(back, "Ticket and all associated responses deleted.")
        }
        Err(e) => {
            log::error!("ticket delete failed: {}", e);
            Flash::error(back, "Failed to delete ticket")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, view, update_status, respond, delete]
}
