use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AgencyUser;
use crate::db::DbPool;
use crate::models::ticket::{Ticket, TicketResponse};
use crate::routes::flash_json;

#[get("/support/tickets")]
pub fn my_tickets(
    user: AgencyUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let tickets = Ticket::list_by_agency(pool, user.agency.id);
    let context = json!({
        "title": "My Support Tickets",
        "tickets": tickets,
        "flash": flash_json(&flash),
    });
    Template::render("pages/my-tickets", context)
}

#[derive(Debug, FromForm)]
pub struct TicketForm {
    pub title: String,
    pub category: String,
    pub message: String,
}

#[post("/support/tickets", data = "<form>")]
pub fn create_ticket(
    user: AgencyUser,
    pool: &State<DbPool>,
    form: Form<TicketForm>,
) -> Flash<Redirect> {
    let back = Redirect::to("/support/tickets");

    if form.title.trim().is_empty()
        || form.category.trim().is_empty()
        || form.message.trim().is_empty()
    {
        return Flash::error(back, "All fields are required to create a ticket.");
    }

    let ticket_id = match Ticket::create(
        pool,
        user.agency.id,
        form.title.trim(),
        form.category.trim(),
        form.message.trim(),
    ) {
        Ok(id) => id,
        Err(e) => {
            log::error!("ticket creation failed: {}", e);
            return Flash::error(back, "Failed to create ticket. Please try again.");
        }
    };

    // The opening message doubles as the first entry of the thread.
    if let Err(e) =
        TicketResponse::create(pool, ticket_id, "agency", user.agency.id, form.message.trim())
    {
        log::error!("ticket initial response failed: {}", e);
    }

    Flash::success(
        Redirect::to(format!("/support/tickets/{}", ticket_id)),
        format!("Ticket #{} created successfully.", ticket_id),
    )
}

#[get("/support/tickets/<id>")]
pub fn view_ticket(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Flash<Redirect>> {
    let ticket = Ticket::find_by_id(pool, id)
        .filter(|t| t.agency_id == user.agency.id)
        .ok_or_else(|| {
            Flash::error(
                Redirect::to("/support/tickets"),
                "Ticket not found or access denied.",
            )
        })?;

    let responses = TicketResponse::list_for_ticket(pool, id);
    let context = json!({
        "title": format!("Ticket #{}", ticket.id),
        "ticket": ticket,
        "responses": responses,
        "flash": flash_json(&flash),
    });
    Ok(Template::render("pages/view-ticket", context))
}

#[derive(Debug, FromForm)]
pub struct TicketReplyForm {
    pub message: String,
}

#[post("/support/tickets/<id>/respond", data = "<form>")]
pub fn respond_to_ticket(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
    form: Form<TicketReplyForm>,
) -> Flash<Redirect> {
    let list = Redirect::to("/support/tickets");
    let thread = Redirect::to(format!("/support/tickets/{}", id));

    let ticket = match Ticket::find_by_id(pool, id) {
        Some(t) if t.agency_id == user.agency.id => t,
        _ => return Flash::error(list, "Ticket not found or access denied."),
    };

    if form.message.trim().is_empty() {
        return Flash::error(thread, "Message is required.");
    }

    if let Err(e) =
        TicketResponse::create(pool, id, "agency", user.agency.id, form.message.trim())
    {
        log::error!("ticket response failed: {}", e);
        return Flash::error(thread, "Failed to send response.");
    }

    // A reply from the agency re-opens a settled ticket.
    if ticket.status == "resolved" || ticket.status == "closed" {
        if let Err(e) = Ticket::update_status(pool, id, "open") {
            log::error!("ticket re-open failed: {}", e);
        }
    }

    Flash::success(thread, "Response sent.")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![my_tickets, create_ticket, view_ticket, respond_to_ticket]
}
