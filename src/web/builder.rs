//! Form authoring endpoints.
//!
//! The batch `/create` endpoint is the preferred path; the incremental
//! per-field endpoints exist for the older server-driven builder and
//! converge on the same end state.

use crate::builder;
use crate::db::get_db_pool;
use crate::middleware::ClientCtx;
use crate::session;
use actix_web::{get, post, web, Error, HttpResponse};
use serde::Deserialize;
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_temp_form)
        .service(save_form)
        .service(add_question)
        .service(write_question)
        .service(edit_question)
        .service(delete_question)
        .service(add_option)
        .service(save_option)
        .service(delete_option)
        .service(delete_form)
        .service(get_form_data);
}

#[derive(Deserialize)]
pub struct SaveFormData {
    pub form_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<builder::QuestionPayload>,
}

#[derive(Deserialize)]
pub struct FormIdData {
    pub form_id: String,
}

#[derive(Deserialize)]
pub struct WriteQuestionData {
    pub qid: String,
    #[serde(default, alias = "question")]
    pub text: String,
    #[serde(rename = "answer_type", alias = "answer-type")]
    pub answer_type: String,
}

#[derive(Deserialize)]
pub struct QuestionIdData {
    pub qid: String,
}

#[derive(Deserialize)]
pub struct AddOptionData {
    pub qid: String,
    #[serde(rename = "type")]
    pub answer_type: Option<String>,
}

#[derive(Deserialize)]
pub struct SaveOptionData {
    pub oid: String,
    #[serde(default, alias = "option")]
    pub text: String,
}

#[derive(Deserialize)]
pub struct OptionIdData {
    pub oid: String,
}

/// Opens a fresh draft and points the session at it. Abandoned drafts
/// from earlier sessions are swept first.
#[post("/create-temp-form")]
pub async fn create_temp_form(
    client: ClientCtx,
    cookies: actix_session::Session,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let db = get_db_pool();

    builder::cleanup_empty_forms(db, &user_id).await?;
    let form = builder::start_draft(db, &user_id).await?;
    session::set_draft_pointer(&cookies, &form.id)?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "form_id": form.id })))
}

/// Batch replace-all plus finalize. On success the draft pointer is
/// cleared; empty name/title cancels the draft entirely.
#[post("/create")]
pub async fn save_form(
    client: ClientCtx,
    cookies: actix_session::Session,
    payload: web::Json<SaveFormData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let db = get_db_pool();

    // An empty question list means the incremental builder already wrote
    // the questions; only name/title remain to commit.
    let result = if payload.questions.is_empty() {
        builder::finalize(
            db,
            &user_id,
            &payload.form_id,
            payload.name.trim(),
            payload.title.trim(),
        )
        .await
    } else {
        builder::save_form(
            db,
            &user_id,
            &payload.form_id,
            payload.name.trim(),
            payload.title.trim(),
            &payload.questions,
        )
        .await
    };

    match result {
        Ok(form) => {
            session::clear_draft_pointer(&cookies);
            Ok(HttpResponse::Ok().json(json!({ "success": true, "form_id": form.id })))
        }
        Err(err) => Err(err.into()),
    }
}

#[post("/addquestion")]
pub async fn add_question(
    client: ClientCtx,
    payload: web::Json<FormIdData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let db = get_db_pool();

    let question = builder::add_question(db, &user_id, &payload.form_id).await?;
    let tree = builder::form_tree(db, &user_id, &payload.form_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "question_id": question.id,
        "form": tree,
    })))
}

#[post("/writequestion")]
pub async fn write_question(
    client: ClientCtx,
    payload: web::Json<WriteQuestionData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let db = get_db_pool();

    let question = builder::write_question(
        db,
        &user_id,
        &payload.qid,
        payload.text.trim(),
        &payload.answer_type,
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "question_id": question.id,
    })))
}

#[post("/editquestion")]
pub async fn edit_question(
    client: ClientCtx,
    payload: web::Json<QuestionIdData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    builder::edit_question(get_db_pool(), &user_id, &payload.qid).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/deletequestion")]
pub async fn delete_question(
    client: ClientCtx,
    payload: web::Json<QuestionIdData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    builder::delete_question(get_db_pool(), &user_id, &payload.qid).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/addoption")]
pub async fn add_option(
    client: ClientCtx,
    payload: web::Json<AddOptionData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;

    let option = builder::add_option(
        get_db_pool(),
        &user_id,
        &payload.qid,
        payload.answer_type.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "option_id": option.id })))
}

#[post("/saveoption")]
pub async fn save_option(
    client: ClientCtx,
    payload: web::Json<SaveOptionData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    builder::save_option(get_db_pool(), &user_id, &payload.oid, payload.text.trim()).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/deleteoption")]
pub async fn delete_option(
    client: ClientCtx,
    payload: web::Json<OptionIdData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    builder::delete_option(get_db_pool(), &user_id, &payload.oid).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/delete")]
pub async fn delete_form(
    client: ClientCtx,
    cookies: actix_session::Session,
    payload: web::Json<FormIdData>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    builder::delete_form(get_db_pool(), &user_id, &payload.form_id).await?;

    if session::draft_pointer(&cookies).as_deref() == Some(payload.form_id.as_str()) {
        session::clear_draft_pointer(&cookies);
    }

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Full draft tree for the authoring UI, unsaved placeholders included.
#[get("/get-form-data/{form_id}")]
pub async fn get_form_data(
    client: ClientCtx,
    path: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_login()?;
    let form_id = path.into_inner();

    let tree = builder::form_tree(get_db_pool(), &user_id, &form_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "form_data": tree })))
}
