use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::auth::AgencyUser;
use crate::db::DbPool;
use crate::models::message::Message;
use crate::routes::flash_json;

#[get("/messages")]
pub fn inbox(
    user: AgencyUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let messages = Message::list_for_recipient(pool, user.agency.id);
    let context = json!({
        "title": "Inbox",
        "messages": messages,
        "unread": Message::unread_count(pool, user.agency.id),
        "flash": flash_json(&flash),
    });
    Template::render("pages/inbox", context)
}

#[get("/messages/<id>")]
pub fn view_message(
    user: AgencyUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Template, Flash<Redirect>> {
    let message = Message::find_by_id(pool, id)
        .filter(|m| m.message.recipient_id == user.agency.id)
        .ok_or_else(|| Flash::error(Redirect::to("/messages"), "Message not found"))?;

    if !message.message.is_read {
        if let Err(e) = Message::mark_read(pool, id) {
            log::error!("mark message read failed: {}", e);
        }
    }

    let context = json!({
        "title": message.message.subject,
        "message": message,
    });
    Ok(Template::render("pages/view-message", context))
}

#[post("/messages/read-all")]
pub fn read_all(user: AgencyUser, pool: &State<DbPool>) -> Flash<Redirect> {
    let back = Redirect::to("/messages");
    match Message::mark_all_read(pool, user.agency.id) {
        Ok(()) => Flash::success(back, "All messages marked as read."),
        Err(e) => {
            log::error!("mark all read failed: {}", e);
            Flash::error(back, "Failed to update messages.")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![inbox, view_message, read_all]
}
