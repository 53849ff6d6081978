#[macro_use]
extern crate rocket;

use rocket::fs::FileServer;
use rocket::http::Header;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::response::content::RawHtml;
use rocket::response::{Flash, Redirect};
use rocket::Request;
use rocket_dyn_templates::Template;

mod auth;
mod boot;
mod db;
mod models;
mod plans;
mod rate_limit;
mod routes;

#[cfg(test)]
mod tests;

use rate_limit::RateLimiter;

/// Back-office pages must never land in a shared cache.
pub struct NoCacheAdmin;

#[rocket::async_trait]
impl Fairing for NoCacheAdmin {
    fn info(&self) -> Info {
        Info { name: "No-Cache Admin Pages", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, req: &'r rocket::Request<'_>, res: &mut rocket::Response<'r>) {
        if req.uri().path().starts_with("/admin") {
            res.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
            res.set_header(Header::new("Pragma", "no-cache"));
        }
    }
}

#[catch(401)]
fn unauthorized(req: &Request) -> Flash<Redirect> {
    if req.uri().path().starts_with("/admin") {
        Flash::error(Redirect::to("/admin/login"), "Admin access required")
    } else {
        Flash::error(Redirect::to("/login"), "Please log in to access this page")
    }
}

#[catch(404)]
fn not_found() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>404</h1><p>That page does not exist.</p><a href='/'>Back to Minerva Hub</a></body></html>".to_string())
}

#[catch(500)]
fn server_error() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>500</h1><p>Something went wrong on our side.</p><a href='/'>Back to Minerva Hub</a></body></html>".to_string())
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    // Boot check — verify/create directories, validate critical files
    boot::run();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed defaults");

    rocket::build()
        .manage(pool)
        .manage(RateLimiter::new())
        .attach(Template::fairing())
        .attach(NoCacheAdmin)
        .mount("/static", FileServer::from("website/static"))
        .mount("/", routes::public::routes())
        .mount("/", routes::auth::routes())
        .mount("/", routes::agency::routes())
        .mount("/", routes::projects::routes())
        .mount("/", routes::reviews::routes())
        .mount("/", routes::tickets::routes())
        .mount("/", routes::messages::routes())
        .mount("/admin", routes::admin::routes())
        .register("/", catchers![unauthorized, not_found, server_error])
}
