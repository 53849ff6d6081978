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
use crate::models::contact::ContactMessage;
use crate::models::message::Message;
use crate::models::plan::Plan;
use crate::routes::flash_json;

// ── Contact form inbox ──

#[get("/contact-messages")]
pub fn contact_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "title": "Contact Messages",
        "messages": ContactMessage::list_all(pool),
        "unread": ContactMessage::unread_count(pool),
        "flash": flash_json(&flash),
    });
    Template::render("admin/contact-messages", context)
}

#[get("/contact-messages/<id>")]
pub fn contact_view(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Template, Flash<Redirect>> {
    let message = ContactMessage::find_by_id(pool, id).ok_or_else(|| {
        Flash::error(Redirect::to("/admin/contact-messages"), "Message not found.")
    })?;

    if !message.is_read {
        if let Err(e) = ContactMessage::mark_read(pool, id) {
            log::error!("contact message mark read failed: {}", e);
        }
    }

    let context = json!({
        "title": "View Message",
        "message": message,
    });
    Ok(Template::render("admin/view-contact-message", context))
}

// ── Broadcast / direct messages ──

#[get("/messages")]
pub fn compose_page(
    _admin: AdminUser,
    pool: &State<DbPool>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let context = json!({
        "title": "Send Message",
        "agencies": Agency::list(pool, Some("approved"))
            .iter()
            .map(|a| a.safe_json())
            .collect::<Vec<_>>(),
        "plans": Plan::list_active(pool),
        "flash": flash_json(&flash),
    });
    Template::render("admin/messages", context)
}

#[derive(Debug, FromForm)]
pub struct BroadcastForm {
    /// "one", "all", or "tier"
    pub audience: String,
    pub recipient_id: Option<i64>,
    pub tier: Option<String>,
    pub subject: String,
    pub body: String,
}

#[post("/messages/send", data = "<form>")]
pub fn send(
    admin: AdminUser,
    pool: &State<DbPool>,
    form: Form<BroadcastForm>,
) -> Flash<Redirect> {
    let back = Redirect::to("/admin/messages");

    if form.subject.trim().is_empty() || form.body.trim().is_empty() {
        return Flash::error(back, "Subject and body are required.");
    }
    let subject = form.subject.trim();
    let body = form.body.trim();

    let outcome = match form.audience.as_str() {
        "one" => {
            let recipient = match form.recipient_id.and_then(|id| Agency::find_by_id(pool, id)) {
                Some(a) => a,
                None => return Flash::error(back, "Recipient not found."),
            };
            Message::create(pool, 0, recipient.id, subject, body).map(|_| 1)
        }
        "all" => Message::send_to_all(pool, subject, body),
        "tier" => {
            let tier = match form.tier.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                Some(t) => t,
                None => return Flash::error(back, "Tier is required for a tier broadcast."),
            };
            Message::send_to_tier(pool, tier, subject, body)
        }
        _ => return Flash::error(back, "Unknown audience."),
    };

    match outcome {
        Ok(count) => {
            ActivityEntry::log(
                pool,
                "admin_message_sent",
                None,
                json!({ "admin_id": admin.admin.id, "audience": form.audience, "recipients": count }),
            );
            Flash::success(back, format!("Message sent to {} recipient(s).", count))
        }
        Err(e) => {
            log::error!("admin message send failed: {}", e);
            Flash::error(back, "Failed to send message.")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![contact_list, contact_view, compose_page, send]
}
