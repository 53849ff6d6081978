use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;

use crate::db::DbPool;
use crate::models::contact::ContactMessage;
use crate::models::settings::Setting;
use crate::routes::{flash_json, looks_like_email};

fn static_page(pool: &DbPool, template: &'static str, title: &str) -> Template {
    let context = json!({
        "title": title,
        "site_name": Setting::get_or(pool, "site_name", "Minerva Metrics Hub"),
    });
    Template::render(format!("pages/{}", template), context)
}

#[get("/")]
pub fn home(pool: &State<DbPool>, flash: Option<FlashMessage<'_>>) -> Template {
    let context = json!({
        "title": Setting::get_or(pool, "site_name", "Minerva Metrics Hub"),
        "site_name": Setting::get_or(pool, "site_name", "Minerva Metrics Hub"),
        "flash": flash_json(&flash),
    });
    Template::render("pages/home", context)
}

#[get("/about")]
pub fn about(pool: &State<DbPool>) -> Template {
    static_page(pool, "about", "About Us")
}

#[get("/help")]
pub fn help(pool: &State<DbPool>) -> Template {
    static_page(pool, "help-center", "Help Center")
}

#[get("/faq")]
pub fn faq(pool: &State<DbPool>) -> Template {
    static_page(pool, "faq", "FAQ")
}

#[get("/contact")]
pub fn contact(pool: &State<DbPool>, flash: Option<FlashMessage<'_>>) -> Template {
    let context = json!({
        "title": "Contact Us",
        "site_name": Setting::get_or(pool, "site_name", "Minerva Metrics Hub"),
        "flash": flash_json(&flash),
    });
    Template::render("pages/contact", context)
}

#[get("/privacy-policy")]
pub fn privacy(pool: &State<DbPool>) -> Template {
    static_page(pool, "privacy-policy", "Privacy Policy")
}

#[get("/terms")]
pub fn terms(pool: &State<DbPool>) -> Template {
    static_page(pool, "terms-of-service", "Terms of Service")
}

#[get("/how-it-works")]
pub fn how_it_works(pool: &State<DbPool>) -> Template {
    static_page(pool, "how-it-works", "How It Works")
}

#[get("/cookies")]
pub fn cookies(pool: &State<DbPool>) -> Template {
    static_page(pool, "cookie-policy", "Cookie Policy")
}

#[derive(Debug, FromForm)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[post("/contact/submit", data = "<form>")]
pub fn contact_submit(
    pool: &State<DbPool>,
    form: Form<ContactForm>,
) -> Flash<Redirect> {
    let redirect = Redirect::to("/contact");

    if form.name.trim().is_empty()
        || form.email.trim().is_empty()
        || form.subject.trim().is_empty()
        || form.message.trim().is_empty()
    {
        return Flash::error(redirect, "All fields are required.");
    }
    if !looks_like_email(&form.email) {
        return Flash::error(redirect, "A valid email address is required.");
    }

    match ContactMessage::create(pool, form.name.trim(), form.email.trim(), form.subject.trim(), &form.message) {
        Ok(_) => Flash::success(
            redirect,
            "Your message has been sent! We will get back to you shortly.",
        ),
        Err(e) => {
            log::error!("contact form submission failed: {}", e);
            Flash::error(redirect, "Failed to send message. Please try again.")
        }
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        home,
        about,
        help,
        faq,
        contact,
        privacy,
        terms,
        how_it_works,
        cookies,
        contact_submit,
    ]
}
