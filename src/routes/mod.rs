use rocket::request::FlashMessage;
use serde_json::{json, Value};

pub mod admin;
pub mod agency;
pub mod auth;
pub mod messages;
pub mod projects;
pub mod public;
pub mod reviews;
pub mod tickets;

/// Fold an incoming flash message into the error/success/info fields every
/// page context carries.
pub(crate) fn flash_json(flash: &Option<FlashMessage<'_>>) -> Value {
    let (error, success, info) = match flash {
        Some(f) => match f.kind() {
            "success" => (None, Some(f.message().to_string()), None),
            "warning" | "info" => (None, None, Some(f.message().to_string())),
            _ => (Some(f.message().to_string()), None, None),
        },
        None => (None, None, None),
    };
    json!({ "error": error, "success": success, "info": info })
}

/// HTML forms submit empty strings for untouched optional fields.
pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() { None } else { Some(s) }
    })
}

/// Good enough for a server-rendered form; real verification is the email
/// round-trip we don't do.
pub(crate) fn looks_like_email(value: &str) -> bool {
    let v = value.trim();
    v.contains('@') && v.contains('.') && !v.starts_with('@') && !v.ends_with('@')
}
