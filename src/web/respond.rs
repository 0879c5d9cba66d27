//! Respondent-facing endpoints and owner statistics.

use crate::builder;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::respond;
use crate::session;
use actix_web::{get, post, web, Error, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_form)
        .service(submit_form)
        .service(view_statistics);
}

/// A single answer may arrive as one string or, for checkboxes, a list.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    One(String),
    Many(Vec<String>),
}

impl AnswerValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

#[derive(Deserialize)]
pub struct SubmitPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub answers: HashMap<String, AnswerValue>,
}

/// Published schema for respondents. No authentication required.
#[get("/respond/{form_id}")]
pub async fn view_form(path: web::Path<String>) -> Result<HttpResponse, Error> {
    let form_id = path.into_inner();
    let form = respond::published_form(get_db_pool(), &form_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "form": form })))
}

/// Accepts one submission per session per form. A second attempt from
/// the same session replays the stored confirmation instead of erroring
/// or writing duplicate rows.
#[post("/respond/{form_id}")]
pub async fn submit_form(
    cookies: actix_session::Session,
    path: web::Path<String>,
    payload: web::Json<SubmitPayload>,
) -> Result<HttpResponse, Error> {
    let form_id = path.into_inner();
    let db = get_db_pool();

    let prior = session::responded_token(&cookies, &form_id);
    let SubmitPayload { name, answers } = payload.into_inner();
    let answers: HashMap<String, Vec<String>> = answers
        .into_iter()
        .map(|(question_id, value)| (question_id, value.into_vec()))
        .collect();

    let outcome = respond::submit(db, &form_id, name.as_deref(), &answers, prior.as_deref()).await?;

    if !outcome.replayed {
        session::mark_responded(&cookies, &form_id, &outcome.token)?;
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "already_submitted": outcome.replayed,
        "confirmation": outcome.token,
    })))
}

/// Owner-only aggregated statistics.
#[get("/responses-statistics/{form_id}")]
pub async fn view_statistics(
    client: ClientCtx,
    path: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let form_id = path.into_inner();
    let db = get_db_pool();

    let form = builder::owned_form(db, &form_id, &user_id).await?;
    let stats = respond::statistics(db, &form).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "statistics": stats })))
}
