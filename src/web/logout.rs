//! Session logout.

use actix_web::{post, Error, HttpResponse, Responder};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_logout);
}

#[post("/logout")]
pub async fn post_logout(session: actix_session::Session) -> Result<impl Responder, Error> {
    session.purge();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
