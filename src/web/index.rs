//! Owner-scoped form listing.

use crate::builder;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use actix_web::{get, Error, HttpResponse};
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_forms);
}

/// Lists the user's finalized forms. Abandoned empty drafts are deleted
/// before the listing is read, so they can never appear in it.
#[get("/forms")]
pub async fn list_forms(client: ClientCtx) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let db = get_db_pool();

    builder::cleanup_empty_forms(db, &user_id).await?;
    let forms = builder::list_forms(db, &user_id).await?;

    let listing: Vec<_> = forms
        .iter()
        .map(|form| {
            json!({
                "form_id": form.id,
                "name": form.name,
                "title": form.title,
                "question_count": form.question_count,
                "responses_count": form.responses_count,
                "created_at": form.created_at,
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "forms": listing })))
}
