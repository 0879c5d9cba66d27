//! Integration tests for whole-form saves: tree replacement, atomicity of
//! rejected payloads, and the delete-on-cancel rule.
mod common;

use common::*;
use formbin::builder;
use formbin::error::FormError;
use formbin::orm::{forms, options, questions, responses};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serial_test::serial;
use std::collections::HashMap;

async fn form_rows(db: &DatabaseConnection, form_id: &str) -> (u64, u64, u64) {
    let q = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form_id))
        .count(db)
        .await
        .expect("count failed");
    let o = options::Entity::find()
        .filter(options::Column::FormId.eq(form_id))
        .count(db)
        .await
        .expect("count failed");
    let r = responses::Entity::find()
        .filter(responses::Column::FormId.eq(form_id))
        .count(db)
        .await
        .expect("count failed");
    (q, o, r)
}

#[actix_rt::test]
#[serial]
async fn batch_save_builds_the_whole_tree() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let draft = builder::start_draft(&db, &user.id).await.expect("draft");
    let saved = builder::save_form(
        &db,
        &user.id,
        &draft.id,
        "survey",
        "Office Survey",
        &[
            question("Favorite color?", "radio", &["Red", "Blue", ""]),
            question("Anything else?", "text", &[]),
        ],
    )
    .await
    .expect("save");

    assert_eq!(saved.name, "survey");
    assert_eq!(saved.title, "Office Survey");
    assert_eq!(saved.question_count, 2);
    assert!(saved.created_at.is_some());

    // Blank option texts are dropped, everything else lands committed.
    let (q, o, r) = form_rows(&db, &draft.id).await;
    assert_eq!((q, o, r), (2, 2, 0));

    let uncommitted = questions::Entity::find()
        .filter(questions::Column::FormId.eq(draft.id.as_str()))
        .filter(questions::Column::Saved.eq(false))
        .count(&db)
        .await
        .expect("count failed");
    assert_eq!(uncommitted, 0);
}

#[actix_rt::test]
#[serial]
async fn rejected_payload_leaves_existing_content_untouched() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let draft = builder::start_draft(&db, &user.id).await.expect("draft");
    let q1 = builder::add_question(&db, &user.id, &draft.id)
        .await
        .expect("add");
    builder::write_question(&db, &user.id, &q1.id, "Kept question", "text")
        .await
        .expect("write");

    let err = builder::save_form(
        &db,
        &user.id,
        &draft.id,
        "survey",
        "Survey",
        &[
            question("Fine", "text", &[]),
            question("Broken", "essay", &[]),
        ],
    )
    .await
    .expect_err("should be rejected");
    assert!(matches!(err, FormError::ValidationFailed(_)));

    // Validation failed before any write, so the incremental content stays.
    let form = forms::Entity::find_by_id(draft.id.clone())
        .one(&db)
        .await
        .expect("query failed")
        .expect("form missing");
    assert_eq!(form.name, "");
    assert_eq!(form.question_count, 1);
    let (q, _, _) = form_rows(&db, &draft.id).await;
    assert_eq!(q, 1);
}

#[actix_rt::test]
#[serial]
async fn empty_question_list_is_rejected() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let draft = builder::start_draft(&db, &user.id).await.expect("draft");
    let err = builder::save_form(&db, &user.id, &draft.id, "survey", "Survey", &[])
        .await
        .expect_err("should be rejected");
    assert!(matches!(err, FormError::ValidationFailed(_)));
}

#[actix_rt::test]
#[serial]
async fn blank_title_deletes_the_draft() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let draft = builder::start_draft(&db, &user.id).await.expect("draft");
    builder::add_question(&db, &user.id, &draft.id)
        .await
        .expect("add");

    let err = builder::save_form(
        &db,
        &user.id,
        &draft.id,
        "survey",
        "",
        &[question("Q", "text", &[])],
    )
    .await
    .expect_err("should be rejected");
    assert!(matches!(err, FormError::ValidationFailed(_)));

    // Cancelled drafts are removed along with their children.
    assert!(forms::Entity::find_by_id(draft.id.clone())
        .one(&db)
        .await
        .expect("query failed")
        .is_none());
    let (q, o, r) = form_rows(&db, &draft.id).await;
    assert_eq!((q, o, r), (0, 0, 0));
}

#[actix_rt::test]
#[serial]
async fn publication_time_is_stamped_once() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let draft = builder::start_draft(&db, &user.id).await.expect("draft");
    let first = builder::save_form(
        &db,
        &user.id,
        &draft.id,
        "survey",
        "Survey",
        &[question("Q", "text", &[])],
    )
    .await
    .expect("save");
    let stamped = first.created_at.expect("created_at");

    let second = builder::save_form(
        &db,
        &user.id,
        &draft.id,
        "survey-v2",
        "Survey v2",
        &[question("Q2", "text", &[])],
    )
    .await
    .expect("resave");

    assert_eq!(second.name, "survey-v2");
    assert_eq!(second.created_at, Some(stamped));
}

#[actix_rt::test]
#[serial]
async fn resave_clears_collected_responses() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = create_published_form(
        &db,
        &user.id,
        "survey",
        "Survey",
        &[question("Color?", "radio", &["Red", "Blue"])],
    )
    .await;
    let q = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form.id.as_str()))
        .one(&db)
        .await
        .expect("query failed")
        .expect("question missing");

    let answers = HashMap::from([(q.id.clone(), vec!["Red".to_owned()])]);
    formbin::respond::submit(&db, &form.id, None, &answers, None)
        .await
        .expect("submit");

    let resaved = builder::save_form(
        &db,
        &user.id,
        &form.id,
        "survey",
        "Survey",
        &[question("Color?", "radio", &["Red", "Blue", "Green"])],
    )
    .await
    .expect("resave");

    // Old answers no longer describe the form, so they are discarded.
    assert_eq!(resaved.responses_count, 0);
    let (_, _, r) = form_rows(&db, &form.id).await;
    assert_eq!(r, 0);
}
