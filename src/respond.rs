//! Response Collector.
//!
//! Accepts respondent submissions against a published form, validates
//! every answer against the live schema before the first write, and
//! persists the whole submission atomically. Duplicate submission by
//! the same session is resolved by replaying the stored confirmation
//! token, never by writing a second set of rows.

use crate::error::FormError;
use crate::ident;
use crate::orm::questions::AnswerType;
use crate::orm::{forms, options, questions, responders, responses};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;

/// Separator for stored checkbox selections.
pub const CHECKBOX_SEPARATOR: &str = ", ";

/// Outcome of a submission: the confirmation token bound to the
/// respondent session, and whether it was replayed from an earlier
/// submission instead of freshly written.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub token: String,
    pub replayed: bool,
}

/// The published schema of a form, as shown to respondents. Unsaved
/// questions and placeholder options are invisible here.
#[derive(Debug, Serialize)]
pub struct PublishedForm {
    pub form_id: String,
    pub name: String,
    pub title: String,
    pub questions: Vec<PublishedQuestion>,
}

#[derive(Debug, Serialize)]
pub struct PublishedQuestion {
    pub question_id: String,
    pub text: String,
    pub answer_type: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OptionCount {
    pub question_id: String,
    pub option_text: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ResponseRow {
    pub response_id: String,
    pub question_id: String,
    pub answer: String,
    pub created_at: chrono::NaiveDateTime,
    pub responder_name: String,
}

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub form_id: String,
    pub name: String,
    pub title: String,
    pub responses_count: i32,
    pub option_counts: Vec<OptionCount>,
    pub responses: Vec<ResponseRow>,
}

/// Committed questions of a form, in display order.
async fn committed_questions(
    db: &DatabaseConnection,
    form_id: &str,
) -> Result<Vec<questions::Model>, FormError> {
    let rows = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form_id))
        .filter(questions::Column::Saved.eq(true))
        .order_by_asc(questions::Column::SortOrder)
        .all(db)
        .await?;

    Ok(rows)
}

/// Non-placeholder option texts per question for a form.
async fn option_texts_by_question(
    db: &DatabaseConnection,
    form_id: &str,
) -> Result<HashMap<String, Vec<String>>, FormError> {
    let rows = options::Entity::find()
        .filter(options::Column::FormId.eq(form_id))
        .filter(options::Column::Text.ne(""))
        .order_by_asc(options::Column::SortOrder)
        .all(db)
        .await?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        map.entry(row.question_id).or_default().push(row.text);
    }

    Ok(map)
}

/// The respondent-facing schema. Fails `NotFound` for an unknown form
/// and rejects forms that have no committed questions.
pub async fn published_form(
    db: &DatabaseConnection,
    form_id: &str,
) -> Result<PublishedForm, FormError> {
    let form = forms::Entity::find_by_id(form_id.to_owned())
        .one(db)
        .await?
        .ok_or(FormError::NotFound("form"))?;

    let question_rows = committed_questions(db, &form.id).await?;
    if question_rows.is_empty() {
        return Err(FormError::invalid("This form has no questions"));
    }

    let mut texts = option_texts_by_question(db, &form.id).await?;
    let questions = question_rows
        .into_iter()
        .map(|question| PublishedQuestion {
            options: texts.remove(&question.id).unwrap_or_default(),
            question_id: question.id,
            text: question.text,
            answer_type: question.answer_type,
        })
        .collect();

    Ok(PublishedForm {
        form_id: form.id,
        name: form.name,
        title: form.title,
        questions,
    })
}

/// Validates and persists one submission.
///
/// `prior_token` is the confirmation this session already holds for the
/// form, if any; when present the call is an idempotent replay and no
/// rows are written. Otherwise every committed question is validated
/// first and any failure aborts the whole submission with the offending
/// questions named.
pub async fn submit(
    db: &DatabaseConnection,
    form_id: &str,
    responder_name: Option<&str>,
    answers: &HashMap<String, Vec<String>>,
    prior_token: Option<&str>,
) -> Result<SubmitOutcome, FormError> {
    if let Some(token) = prior_token {
        return Ok(SubmitOutcome {
            token: token.to_owned(),
            replayed: true,
        });
    }

    let form = forms::Entity::find_by_id(form_id.to_owned())
        .one(db)
        .await?
        .ok_or(FormError::NotFound("form"))?;

    let question_rows = committed_questions(db, &form.id).await?;
    if question_rows.is_empty() {
        return Err(FormError::invalid("This form has no questions"));
    }

    let option_texts = option_texts_by_question(db, &form.id).await?;

    // Validate everything before the first write.
    let mut errors = Vec::new();
    let mut accepted: Vec<(String, String)> = Vec::new();
    for question in &question_rows {
        let selected = answers
            .get(&question.id)
            .map(|values| values.as_slice())
            .unwrap_or(&[]);
        let valid: &[String] = option_texts
            .get(&question.id)
            .map(|texts| texts.as_slice())
            .unwrap_or(&[]);

        let kind = match question.kind() {
            Some(kind) => kind,
            // A committed question always carries a type; treat a broken
            // row as unanswerable rather than a panic.
            None => {
                errors.push(format!("Question has no answer type: {}", question.text));
                continue;
            }
        };

        match kind {
            AnswerType::Text => match single_answer(selected) {
                Some(answer) => accepted.push((question.id.clone(), answer.to_owned())),
                None => errors.push(format!("Answer required for: {}", question.text)),
            },
            AnswerType::Radio | AnswerType::Dropdown => match single_answer(selected) {
                Some(answer) if valid.iter().any(|text| text == answer) => {
                    accepted.push((question.id.clone(), answer.to_owned()));
                }
                Some(_) => errors.push(format!("Invalid option selected for: {}", question.text)),
                None => errors.push(format!("Please select an option for: {}", question.text)),
            },
            AnswerType::Checkbox => {
                let picked: Vec<&String> =
                    selected.iter().filter(|value| !value.is_empty()).collect();
                if picked.iter().any(|value| !valid.contains(value)) {
                    errors.push(format!("Invalid options selected for: {}", question.text));
                } else if !picked.is_empty() {
                    // Selection order is preserved in the stored answer.
                    let joined = picked
                        .iter()
                        .map(|value| value.as_str())
                        .collect::<Vec<_>>()
                        .join(CHECKBOX_SEPARATOR);
                    accepted.push((question.id.clone(), joined));
                }
                // Zero selections is acceptable; checkbox questions are
                // optional and write no row.
            }
        }
    }

    if !errors.is_empty() {
        return Err(FormError::ValidationFailed(errors));
    }

    let txn = db.begin().await?;

    let responder_id = ident::allocate::<responders::Entity, _>(&txn).await?;
    let display_name = match responder_name {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => format!("Anonymous-{}", &responder_id[..6]),
    };
    responders::ActiveModel {
        id: Set(responder_id.clone()),
        name: Set(display_name),
    }
    .insert(&txn)
    .await?;

    let now = Utc::now().naive_utc();
    for (question_id, answer) in accepted {
        let response_id = ident::allocate::<responses::Entity, _>(&txn).await?;
        responses::ActiveModel {
            id: Set(response_id),
            answer: Set(answer),
            created_at: Set(now),
            question_id: Set(question_id),
            form_id: Set(form.id.clone()),
            responder_id: Set(responder_id.clone()),
        }
        .insert(&txn)
        .await?;
    }

    forms::Entity::update_many()
        .col_expr(
            forms::Column::ResponsesCount,
            Expr::col(forms::Column::ResponsesCount).add(1),
        )
        .filter(forms::Column::Id.eq(form.id.as_str()))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok(SubmitOutcome {
        token: uuid::Uuid::new_v4().to_string(),
        replayed: false,
    })
}

fn single_answer(selected: &[String]) -> Option<&String> {
    match selected {
        [answer] if !answer.is_empty() => Some(answer),
        _ => None,
    }
}

/// Aggregated statistics for a form's owner: per-option selection
/// counts grouped by (question, option text) and the raw response rows
/// with responder display names. Checkbox answers are split on the
/// separator so each selection counts toward its option.
pub async fn statistics(
    db: &DatabaseConnection,
    form: &forms::Model,
) -> Result<Statistics, FormError> {
    let question_rows = committed_questions(db, &form.id).await?;
    let option_texts = option_texts_by_question(db, &form.id).await?;

    let response_rows = responses::Entity::find()
        .filter(responses::Column::FormId.eq(form.id.as_str()))
        .order_by_asc(responses::Column::CreatedAt)
        .find_also_related(responders::Entity)
        .all(db)
        .await?;

    let mut option_counts = Vec::new();
    for question in &question_rows {
        let Some(texts) = option_texts.get(&question.id) else {
            continue;
        };
        for text in texts {
            let count = response_rows
                .iter()
                .filter(|(response, _)| response.question_id == question.id)
                .filter(|(response, _)| {
                    // Exact match covers single-choice answers whose option
                    // text happens to contain the separator.
                    response.answer == *text
                        || response
                            .answer
                            .split(CHECKBOX_SEPARATOR)
                            .any(|selection| selection == text)
                })
                .count() as i64;
            option_counts.push(OptionCount {
                question_id: question.id.clone(),
                option_text: text.clone(),
                count,
            });
        }
    }

    let responses = response_rows
        .into_iter()
        .map(|(response, responder)| ResponseRow {
            response_id: response.id,
            question_id: response.question_id,
            answer: response.answer,
            created_at: response.created_at,
            responder_name: responder.map(|r| r.name).unwrap_or_default(),
        })
        .collect();

    Ok(Statistics {
        form_id: form.id.clone(),
        name: form.name.clone(),
        title: form.title.clone(),
        responses_count: form.responses_count,
        option_counts,
        responses,
    })
}
