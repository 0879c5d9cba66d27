//! Session state contract and password hashing.
//!
//! Three keys live in the cookie session:
//! - `user_id`: set at login, cleared at logout.
//! - `form_id`: the draft pointer, the form currently open in the
//!   authoring UI.
//! - `responded_forms`: map of form id to confirmation token for forms
//!   this session has already submitted.

use actix_session::Session;
use actix_web::error;
use argon2::Argon2;
use once_cell::sync::OnceCell;
use std::collections::HashMap;

pub const KEY_USER_ID: &str = "user_id";
pub const KEY_DRAFT_FORM: &str = "form_id";
pub const KEY_RESPONDED_FORMS: &str = "responded_forms";

static ARGON2: OnceCell<Argon2<'static>> = OnceCell::new();

pub fn init() {
    get_argon2();
}

pub fn get_argon2() -> &'static Argon2<'static> {
    ARGON2.get_or_init(Argon2::default)
}

pub fn user_id(session: &Session) -> Option<String> {
    session.get::<String>(KEY_USER_ID).ok().flatten()
}

/// Returns the form currently being authored by this session, if any.
pub fn draft_pointer(session: &Session) -> Option<String> {
    session.get::<String>(KEY_DRAFT_FORM).ok().flatten()
}

pub fn set_draft_pointer(session: &Session, form_id: &str) -> Result<(), actix_web::Error> {
    session
        .insert(KEY_DRAFT_FORM, form_id.to_owned())
        .map_err(error::ErrorInternalServerError)
}

pub fn clear_draft_pointer(session: &Session) {
    session.remove(KEY_DRAFT_FORM);
}

/// Confirmation token from a prior submission to `form_id`, if this
/// session has one.
pub fn responded_token(session: &Session, form_id: &str) -> Option<String> {
    session
        .get::<HashMap<String, String>>(KEY_RESPONDED_FORMS)
        .ok()
        .flatten()
        .and_then(|map| map.get(form_id).cloned())
}

pub fn mark_responded(
    session: &Session,
    form_id: &str,
    token: &str,
) -> Result<(), actix_web::Error> {
    let mut map = session
        .get::<HashMap<String, String>>(KEY_RESPONDED_FORMS)
        .ok()
        .flatten()
        .unwrap_or_default();
    map.insert(form_id.to_owned(), token.to_owned());
    session
        .insert(KEY_RESPONDED_FORMS, map)
        .map_err(error::ErrorInternalServerError)
}
