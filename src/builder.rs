//! Draft Editor and Publication Guard.
//!
//! All operations run as one transaction against the Entity Store.
//! Counter columns (`question_count`, `option_count`) are recomputed
//! from the child rows inside that same transaction, so they can never
//! desynchronize or fall below zero.

use crate::error::FormError;
use crate::ident;
use crate::orm::questions::AnswerType;
use crate::orm::{forms, options, questions, responses};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};

/// One question in a batch `save-form` payload. Field aliases accept
/// the older client-side builder's naming.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionPayload {
    #[serde(alias = "question")]
    pub text: String,
    #[serde(alias = "answerType")]
    pub answer_type: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FormTree {
    pub form_id: String,
    pub name: String,
    pub title: String,
    pub question_count: i32,
    pub responses_count: i32,
    pub questions: Vec<QuestionTree>,
}

#[derive(Debug, Serialize)]
pub struct QuestionTree {
    pub question_id: String,
    pub text: String,
    pub answer_type: String,
    pub saved: bool,
    pub option_count: i32,
    pub options: Vec<OptionTree>,
}

#[derive(Debug, Serialize)]
pub struct OptionTree {
    pub option_id: String,
    pub text: String,
}

/// Resolves a form and checks the acting user owns it.
pub async fn owned_form<C: ConnectionTrait>(
    conn: &C,
    form_id: &str,
    user_id: &str,
) -> Result<forms::Model, FormError> {
    let form = forms::Entity::find_by_id(form_id.to_owned())
        .one(conn)
        .await?
        .ok_or(FormError::NotFound("form"))?;

    if form.user_id != user_id {
        return Err(FormError::AccessDenied);
    }

    Ok(form)
}

/// Resolves a question through its parent form's ownership chain.
pub async fn owned_question<C: ConnectionTrait>(
    conn: &C,
    question_id: &str,
    user_id: &str,
) -> Result<(questions::Model, forms::Model), FormError> {
    let question = questions::Entity::find_by_id(question_id.to_owned())
        .one(conn)
        .await?
        .ok_or(FormError::NotFound("question"))?;
    let form = owned_form(conn, &question.form_id, user_id).await?;

    Ok((question, form))
}

/// Resolves an option through its parent form's ownership chain.
pub async fn owned_option<C: ConnectionTrait>(
    conn: &C,
    option_id: &str,
    user_id: &str,
) -> Result<(options::Model, forms::Model), FormError> {
    let option = options::Entity::find_by_id(option_id.to_owned())
        .one(conn)
        .await?
        .ok_or(FormError::NotFound("option"))?;
    let form = owned_form(conn, &option.form_id, user_id).await?;

    Ok((option, form))
}

/// Rewrites the cached saved-question count from the actual rows.
async fn sync_question_count<C: ConnectionTrait>(conn: &C, form_id: &str) -> Result<i32, DbErr> {
    let count = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form_id))
        .filter(questions::Column::Saved.eq(true))
        .count(conn)
        .await? as i32;

    forms::Entity::update_many()
        .col_expr(forms::Column::QuestionCount, Expr::value(count))
        .filter(forms::Column::Id.eq(form_id))
        .exec(conn)
        .await?;

    Ok(count)
}

/// Rewrites the cached option count from the actual rows.
async fn sync_option_count<C: ConnectionTrait>(conn: &C, question_id: &str) -> Result<i32, DbErr> {
    let count = options::Entity::find()
        .filter(options::Column::QuestionId.eq(question_id))
        .count(conn)
        .await? as i32;

    questions::Entity::update_many()
        .col_expr(questions::Column::OptionCount, Expr::value(count))
        .filter(questions::Column::Id.eq(question_id))
        .exec(conn)
        .await?;

    Ok(count)
}

/// Deletes a question's responses and options before the question row
/// itself, so no orphan can survive a partial failure.
async fn delete_question_rows<C: ConnectionTrait>(
    conn: &C,
    question_id: &str,
) -> Result<(), DbErr> {
    responses::Entity::delete_many()
        .filter(responses::Column::QuestionId.eq(question_id))
        .exec(conn)
        .await?;
    options::Entity::delete_many()
        .filter(options::Column::QuestionId.eq(question_id))
        .exec(conn)
        .await?;
    questions::Entity::delete_many()
        .filter(questions::Column::Id.eq(question_id))
        .exec(conn)
        .await?;

    Ok(())
}

/// Deletes a form and everything under it, in dependency order.
async fn delete_form_rows<C: ConnectionTrait>(conn: &C, form_id: &str) -> Result<(), DbErr> {
    responses::Entity::delete_many()
        .filter(responses::Column::FormId.eq(form_id))
        .exec(conn)
        .await?;
    options::Entity::delete_many()
        .filter(options::Column::FormId.eq(form_id))
        .exec(conn)
        .await?;
    questions::Entity::delete_many()
        .filter(questions::Column::FormId.eq(form_id))
        .exec(conn)
        .await?;
    forms::Entity::delete_many()
        .filter(forms::Column::Id.eq(form_id))
        .exec(conn)
        .await?;

    Ok(())
}

/// Creates an empty draft form scoped to the authoring user.
pub async fn start_draft(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<forms::Model, FormError> {
    let txn = db.begin().await?;

    let id = ident::allocate::<forms::Entity, _>(&txn).await?;
    let form = forms::ActiveModel {
        id: Set(id),
        name: Set(String::new()),
        title: Set(String::new()),
        question_count: Set(0),
        responses_count: Set(0),
        created_at: Set(None),
        user_id: Set(user_id.to_owned()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(form)
}

/// Appends an unsaved placeholder question. The saved-question count is
/// untouched; empty questions are not counted.
pub async fn add_question(
    db: &DatabaseConnection,
    user_id: &str,
    form_id: &str,
) -> Result<questions::Model, FormError> {
    let form = owned_form(db, form_id, user_id).await?;

    let txn = db.begin().await?;

    // max + 1 rather than the row count; a mid-list delete must not
    // let the next question collide with a surviving sort_order.
    let sort_order = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form.id.as_str()))
        .order_by_desc(questions::Column::SortOrder)
        .one(&txn)
        .await?
        .map(|q| q.sort_order + 1)
        .unwrap_or(0);

    let id = ident::allocate::<questions::Entity, _>(&txn).await?;
    let question = questions::ActiveModel {
        id: Set(id),
        text: Set(String::new()),
        answer_type: Set(String::new()),
        option_count: Set(0),
        saved: Set(false),
        sort_order: Set(sort_order),
        form_id: Set(form.id.clone()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(question)
}

/// Commits a question's text and answer type, marking it saved. A
/// downgrade to `text` cascades option deletion and zeroes the option
/// count.
pub async fn write_question(
    db: &DatabaseConnection,
    user_id: &str,
    question_id: &str,
    text: &str,
    answer_type: &str,
) -> Result<questions::Model, FormError> {
    let kind = AnswerType::parse(answer_type)
        .ok_or_else(|| FormError::invalid(format!("Invalid answer type: {:?}", answer_type)))?;
    let (question, form) = owned_question(db, question_id, user_id).await?;

    let txn = db.begin().await?;

    if kind == AnswerType::Text {
        options::Entity::delete_many()
            .filter(options::Column::QuestionId.eq(question.id.as_str()))
            .exec(&txn)
            .await?;
    }

    let id = question.id.clone();
    let mut active: questions::ActiveModel = question.into();
    active.text = Set(text.to_owned());
    active.answer_type = Set(kind.as_str().to_owned());
    active.saved = Set(true);
    active.update(&txn).await?;

    sync_option_count(&txn, &id).await?;
    sync_question_count(&txn, &form.id).await?;

    let updated = questions::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(FormError::NotFound("question"))?;

    txn.commit().await?;
    Ok(updated)
}

/// Reopens a saved question for editing. Its options are kept so
/// in-place corrections don't lose work.
pub async fn edit_question(
    db: &DatabaseConnection,
    user_id: &str,
    question_id: &str,
) -> Result<(), FormError> {
    let (question, form) = owned_question(db, question_id, user_id).await?;

    let txn = db.begin().await?;

    let mut active: questions::ActiveModel = question.into();
    active.saved = Set(false);
    active.update(&txn).await?;

    sync_question_count(&txn, &form.id).await?;

    txn.commit().await?;
    Ok(())
}

pub async fn delete_question(
    db: &DatabaseConnection,
    user_id: &str,
    question_id: &str,
) -> Result<(), FormError> {
    let (question, form) = owned_question(db, question_id, user_id).await?;

    let txn = db.begin().await?;
    delete_question_rows(&txn, &question.id).await?;
    sync_question_count(&txn, &form.id).await?;
    txn.commit().await?;

    Ok(())
}

/// Appends an empty placeholder option. `answer_type`, when given,
/// also switches the parent question's type (the authoring UI sends it
/// with the first option of a fresh question).
pub async fn add_option(
    db: &DatabaseConnection,
    user_id: &str,
    question_id: &str,
    answer_type: Option<&str>,
) -> Result<options::Model, FormError> {
    let (question, form) = owned_question(db, question_id, user_id).await?;

    let kind = match answer_type {
        Some(raw) => AnswerType::parse(raw)
            .ok_or_else(|| FormError::invalid(format!("Invalid answer type: {:?}", raw)))?,
        None => question
            .kind()
            .ok_or_else(|| FormError::invalid("Question has no answer type yet"))?,
    };
    if !kind.has_options() {
        return Err(FormError::invalid("Text questions cannot have options"));
    }

    let txn = db.begin().await?;

    if question.answer_type != kind.as_str() {
        let mut active: questions::ActiveModel = question.clone().into();
        active.answer_type = Set(kind.as_str().to_owned());
        active.update(&txn).await?;
    }

    let sort_order = options::Entity::find()
        .filter(options::Column::QuestionId.eq(question.id.as_str()))
        .order_by_desc(options::Column::SortOrder)
        .one(&txn)
        .await?
        .map(|o| o.sort_order + 1)
        .unwrap_or(0);

    let id = ident::allocate::<options::Entity, _>(&txn).await?;
    let option = options::ActiveModel {
        id: Set(id),
        text: Set(String::new()),
        question_id: Set(question.id.clone()),
        form_id: Set(form.id.clone()),
        sort_order: Set(sort_order),
    }
    .insert(&txn)
    .await?;

    sync_option_count(&txn, &question.id).await?;

    txn.commit().await?;
    Ok(option)
}

pub async fn save_option(
    db: &DatabaseConnection,
    user_id: &str,
    option_id: &str,
    text: &str,
) -> Result<(), FormError> {
    let (option, _form) = owned_option(db, option_id, user_id).await?;

    let mut active: options::ActiveModel = option.into();
    active.text = Set(text.to_owned());
    active.update(db).await?;

    Ok(())
}

pub async fn delete_option(
    db: &DatabaseConnection,
    user_id: &str,
    option_id: &str,
) -> Result<(), FormError> {
    let (option, _form) = owned_option(db, option_id, user_id).await?;

    let txn = db.begin().await?;

    options::Entity::delete_many()
        .filter(options::Column::Id.eq(option.id.as_str()))
        .exec(&txn)
        .await?;
    sync_option_count(&txn, &option.question_id).await?;

    txn.commit().await?;
    Ok(())
}

/// Purges placeholder questions (empty text) with their options, and
/// placeholder options left on surviving questions. Runs inside the
/// caller's transaction.
pub async fn cleanup_empty<C: ConnectionTrait>(conn: &C, form_id: &str) -> Result<(), FormError> {
    let empty_questions = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form_id))
        .filter(questions::Column::Text.eq(""))
        .all(conn)
        .await?;

    for question in &empty_questions {
        delete_question_rows(conn, &question.id).await?;
    }

    options::Entity::delete_many()
        .filter(options::Column::FormId.eq(form_id))
        .filter(options::Column::Text.eq(""))
        .exec(conn)
        .await?;

    let survivors = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form_id))
        .all(conn)
        .await?;
    for question in &survivors {
        sync_option_count(conn, &question.id).await?;
    }
    sync_question_count(conn, form_id).await?;

    Ok(())
}

/// Deletes every abandoned draft owned by `user_id`: empty name, empty
/// title, and no saved questions. Run before listing so listings never
/// show drafts abandoned mid-edit.
pub async fn cleanup_empty_forms(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<(), FormError> {
    let abandoned = forms::Entity::find()
        .filter(forms::Column::UserId.eq(user_id))
        .filter(forms::Column::Name.eq(""))
        .filter(forms::Column::Title.eq(""))
        .filter(forms::Column::QuestionCount.lte(0))
        .all(db)
        .await?;

    if abandoned.is_empty() {
        return Ok(());
    }

    let txn = db.begin().await?;
    for form in &abandoned {
        delete_form_rows(&txn, &form.id).await?;
    }
    txn.commit().await?;

    log::debug!(
        "cleanup_empty_forms: removed {} abandoned draft(s) for user {}",
        abandoned.len(),
        user_id
    );
    Ok(())
}

/// Publication Guard for the incremental path. Empty name or title
/// cancels the draft: the whole form is deleted and the caller gets a
/// validation error. Otherwise name/title are committed, `created_at`
/// is stamped on the first finalize only, and placeholders are purged.
pub async fn finalize(
    db: &DatabaseConnection,
    user_id: &str,
    form_id: &str,
    name: &str,
    title: &str,
) -> Result<forms::Model, FormError> {
    let form = owned_form(db, form_id, user_id).await?;

    if name.is_empty() || title.is_empty() {
        let txn = db.begin().await?;
        delete_form_rows(&txn, &form.id).await?;
        txn.commit().await?;
        return Err(FormError::invalid("Form name and title are required"));
    }

    let txn = db.begin().await?;

    cleanup_empty(&txn, &form.id).await?;

    let stamp_created = form.created_at.is_none();
    let mut active: forms::ActiveModel = form.clone().into();
    active.name = Set(name.to_owned());
    active.title = Set(title.to_owned());
    if stamp_created {
        active.created_at = Set(Some(Utc::now().naive_utc()));
    }
    active.update(&txn).await?;

    let updated = forms::Entity::find_by_id(form.id)
        .one(&txn)
        .await?
        .ok_or(FormError::NotFound("form"))?;

    txn.commit().await?;
    Ok(updated)
}

/// Batch replace-all followed by the Publication Guard, as one atomic
/// unit: the form's entire question/option tree is dropped and rebuilt
/// from the payload with freshly allocated ids. A malformed payload
/// leaves the store untouched. Existing responses reference the dropped
/// questions and are cleared with them.
pub async fn save_form(
    db: &DatabaseConnection,
    user_id: &str,
    form_id: &str,
    name: &str,
    title: &str,
    payload: &[QuestionPayload],
) -> Result<forms::Model, FormError> {
    let form = owned_form(db, form_id, user_id).await?;

    if name.is_empty() || title.is_empty() {
        let txn = db.begin().await?;
        delete_form_rows(&txn, &form.id).await?;
        txn.commit().await?;
        return Err(FormError::invalid("Form name and title are required"));
    }

    if payload.is_empty() {
        return Err(FormError::invalid("At least one question is required"));
    }

    // Reject the whole payload before any write.
    let mut errors = Vec::new();
    let mut kinds = Vec::with_capacity(payload.len());
    for (index, question) in payload.iter().enumerate() {
        if question.text.is_empty() {
            errors.push(format!("Question {} is missing its text", index + 1));
        }
        match AnswerType::parse(&question.answer_type) {
            Some(kind) => kinds.push(kind),
            None => {
                errors.push(format!(
                    "Question {} has an invalid answer type: {:?}",
                    index + 1,
                    question.answer_type
                ));
                kinds.push(AnswerType::Text);
            }
        }
    }
    if !errors.is_empty() {
        return Err(FormError::ValidationFailed(errors));
    }

    let txn = db.begin().await?;

    delete_form_rows_keep_form(&txn, &form.id).await?;

    for (index, (question, kind)) in payload.iter().zip(kinds.iter()).enumerate() {
        let question_id = ident::allocate::<questions::Entity, _>(&txn).await?;

        // Empty option texts are mid-edit placeholders; they don't survive
        // a batch save.
        let option_texts: Vec<&String> = if kind.has_options() {
            question.options.iter().filter(|o| !o.is_empty()).collect()
        } else {
            Vec::new()
        };

        questions::ActiveModel {
            id: Set(question_id.clone()),
            text: Set(question.text.clone()),
            answer_type: Set(kind.as_str().to_owned()),
            option_count: Set(option_texts.len() as i32),
            saved: Set(true),
            sort_order: Set(index as i32),
            form_id: Set(form.id.clone()),
        }
        .insert(&txn)
        .await?;

        for (sort_order, text) in option_texts.iter().enumerate() {
            let option_id = ident::allocate::<options::Entity, _>(&txn).await?;
            options::ActiveModel {
                id: Set(option_id),
                text: Set((*text).clone()),
                question_id: Set(question_id.clone()),
                form_id: Set(form.id.clone()),
                sort_order: Set(sort_order as i32),
            }
            .insert(&txn)
            .await?;
        }
    }

    let stamp_created = form.created_at.is_none();
    let mut active: forms::ActiveModel = form.clone().into();
    active.name = Set(name.to_owned());
    active.title = Set(title.to_owned());
    active.question_count = Set(payload.len() as i32);
    active.responses_count = Set(0);
    if stamp_created {
        active.created_at = Set(Some(Utc::now().naive_utc()));
    }
    active.update(&txn).await?;

    let updated = forms::Entity::find_by_id(form.id)
        .one(&txn)
        .await?
        .ok_or(FormError::NotFound("form"))?;

    txn.commit().await?;
    Ok(updated)
}

/// Like [`delete_form_rows`] but keeps the form row itself; used by the
/// batch replace.
async fn delete_form_rows_keep_form<C: ConnectionTrait>(
    conn: &C,
    form_id: &str,
) -> Result<(), DbErr> {
    responses::Entity::delete_many()
        .filter(responses::Column::FormId.eq(form_id))
        .exec(conn)
        .await?;
    options::Entity::delete_many()
        .filter(options::Column::FormId.eq(form_id))
        .exec(conn)
        .await?;
    questions::Entity::delete_many()
        .filter(questions::Column::FormId.eq(form_id))
        .exec(conn)
        .await?;

    Ok(())
}

/// Owner-checked hard delete of a form and everything under it.
pub async fn delete_form(
    db: &DatabaseConnection,
    user_id: &str,
    form_id: &str,
) -> Result<(), FormError> {
    let form = owned_form(db, form_id, user_id).await?;

    let txn = db.begin().await?;
    delete_form_rows(&txn, &form.id).await?;
    txn.commit().await?;

    Ok(())
}

/// The owner's listable forms. Drafts with empty name/title never
/// appear; run [`cleanup_empty_forms`] first to drop abandoned ones.
pub async fn list_forms(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<forms::Model>, FormError> {
    let found = forms::Entity::find()
        .filter(forms::Column::UserId.eq(user_id))
        .filter(forms::Column::Name.ne(""))
        .filter(forms::Column::Title.ne(""))
        .order_by_asc(forms::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(found)
}

/// Full authoring-state tree for a form, unsaved placeholders included.
/// Feeds the AJAX refresh in the authoring UI.
pub async fn form_tree(
    db: &DatabaseConnection,
    user_id: &str,
    form_id: &str,
) -> Result<FormTree, FormError> {
    let form = owned_form(db, form_id, user_id).await?;

    let question_rows = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form.id.as_str()))
        .order_by_asc(questions::Column::SortOrder)
        .all(db)
        .await?;

    let option_rows = options::Entity::find()
        .filter(options::Column::FormId.eq(form.id.as_str()))
        .order_by_asc(options::Column::SortOrder)
        .all(db)
        .await?;

    let questions = question_rows
        .into_iter()
        .map(|question| {
            let options = option_rows
                .iter()
                .filter(|option| option.question_id == question.id)
                .map(|option| OptionTree {
                    option_id: option.id.clone(),
                    text: option.text.clone(),
                })
                .collect();

            QuestionTree {
                question_id: question.id,
                text: question.text,
                answer_type: question.answer_type,
                saved: question.saved,
                option_count: question.option_count,
                options,
            }
        })
        .collect();

    Ok(FormTree {
        form_id: form.id,
        name: form.name,
        title: form.title,
        question_count: form.question_count,
        responses_count: form.responses_count,
        questions,
    })
}
