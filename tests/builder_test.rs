//! Integration tests for the incremental draft editor: question/option
//! lifecycle, counter maintenance, and ownership checks.
mod common;

use common::*;
use formbin::builder;
use formbin::error::FormError;
use formbin::orm::{forms, options, questions};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serial_test::serial;

async fn reload_form(db: &DatabaseConnection, form_id: &str) -> forms::Model {
    forms::Entity::find_by_id(form_id.to_owned())
        .one(db)
        .await
        .expect("query failed")
        .expect("form missing")
}

async fn reload_question(db: &DatabaseConnection, question_id: &str) -> questions::Model {
    questions::Entity::find_by_id(question_id.to_owned())
        .one(db)
        .await
        .expect("query failed")
        .expect("question missing")
}

async fn count_options(db: &DatabaseConnection, question_id: &str) -> u64 {
    options::Entity::find()
        .filter(options::Column::QuestionId.eq(question_id))
        .count(db)
        .await
        .expect("count failed")
}

#[actix_rt::test]
#[serial]
async fn question_count_tracks_saved_questions() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = builder::start_draft(&db, &user.id).await.expect("draft");
    assert_eq!(form.question_count, 0);

    // An unsaved placeholder is not counted.
    let q1 = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");
    assert!(!q1.saved);
    assert_eq!(reload_form(&db, &form.id).await.question_count, 0);

    builder::write_question(&db, &user.id, &q1.id, "Favorite color?", "text")
        .await
        .expect("write");
    assert_eq!(reload_form(&db, &form.id).await.question_count, 1);

    let q2 = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");
    builder::write_question(&db, &user.id, &q2.id, "Favorite shape?", "radio")
        .await
        .expect("write");
    assert_eq!(reload_form(&db, &form.id).await.question_count, 2);

    // Reopening for edit removes it from the committed set.
    builder::edit_question(&db, &user.id, &q2.id)
        .await
        .expect("edit");
    assert_eq!(reload_form(&db, &form.id).await.question_count, 1);

    builder::write_question(&db, &user.id, &q2.id, "Favorite shape?", "radio")
        .await
        .expect("rewrite");
    assert_eq!(reload_form(&db, &form.id).await.question_count, 2);

    builder::delete_question(&db, &user.id, &q1.id)
        .await
        .expect("delete");
    assert_eq!(reload_form(&db, &form.id).await.question_count, 1);
}

#[actix_rt::test]
#[serial]
async fn type_downgrade_to_text_deletes_options() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = builder::start_draft(&db, &user.id).await.expect("draft");
    let q = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");

    let o1 = builder::add_option(&db, &user.id, &q.id, Some("radio"))
        .await
        .expect("option");
    let o2 = builder::add_option(&db, &user.id, &q.id, Some("radio"))
        .await
        .expect("option");
    builder::save_option(&db, &user.id, &o1.id, "Red")
        .await
        .expect("save option");
    builder::save_option(&db, &user.id, &o2.id, "Blue")
        .await
        .expect("save option");

    builder::write_question(&db, &user.id, &q.id, "Color?", "radio")
        .await
        .expect("write");
    assert_eq!(reload_question(&db, &q.id).await.option_count, 2);

    // Downgrade cascades option deletion and zeroes the counter.
    let downgraded = builder::write_question(&db, &user.id, &q.id, "Color?", "text")
        .await
        .expect("downgrade");
    assert_eq!(downgraded.option_count, 0);
    assert_eq!(count_options(&db, &q.id).await, 0);
}

#[actix_rt::test]
#[serial]
async fn option_counts_follow_rows() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = builder::start_draft(&db, &user.id).await.expect("draft");
    let q = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");

    let o1 = builder::add_option(&db, &user.id, &q.id, Some("checkbox"))
        .await
        .expect("option");
    let o2 = builder::add_option(&db, &user.id, &q.id, Some("checkbox"))
        .await
        .expect("option");
    assert_eq!(reload_question(&db, &q.id).await.option_count, 2);

    builder::delete_option(&db, &user.id, &o1.id)
        .await
        .expect("delete option");
    assert_eq!(reload_question(&db, &q.id).await.option_count, 1);

    builder::delete_option(&db, &user.id, &o2.id)
        .await
        .expect("delete option");
    assert_eq!(reload_question(&db, &q.id).await.option_count, 0);
}

#[actix_rt::test]
#[serial]
async fn sort_order_stays_unique_after_a_middle_delete() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = builder::start_draft(&db, &user.id).await.expect("draft");
    let _q1 = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");
    let q2 = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");
    let _q3 = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");

    builder::delete_question(&db, &user.id, &q2.id)
        .await
        .expect("delete");
    let q4 = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");
    assert_eq!(q4.sort_order, 3);

    let orders: Vec<i32> = questions::Entity::find()
        .filter(questions::Column::FormId.eq(form.id.as_str()))
        .all(&db)
        .await
        .expect("query failed")
        .into_iter()
        .map(|q| q.sort_order)
        .collect();
    let mut deduped = orders.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), orders.len());

    // Options allocate the same way.
    let o1 = builder::add_option(&db, &user.id, &q4.id, Some("radio"))
        .await
        .expect("option");
    builder::add_option(&db, &user.id, &q4.id, Some("radio"))
        .await
        .expect("option");
    builder::delete_option(&db, &user.id, &o1.id)
        .await
        .expect("delete option");
    let o3 = builder::add_option(&db, &user.id, &q4.id, Some("radio"))
        .await
        .expect("option");
    assert_eq!(o3.sort_order, 2);
}

#[actix_rt::test]
#[serial]
async fn edit_question_keeps_existing_options() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = builder::start_draft(&db, &user.id).await.expect("draft");
    let q = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");
    let o = builder::add_option(&db, &user.id, &q.id, Some("dropdown"))
        .await
        .expect("option");
    builder::save_option(&db, &user.id, &o.id, "One")
        .await
        .expect("save option");
    builder::write_question(&db, &user.id, &q.id, "Pick one", "dropdown")
        .await
        .expect("write");

    builder::edit_question(&db, &user.id, &q.id)
        .await
        .expect("edit");

    let reopened = reload_question(&db, &q.id).await;
    assert!(!reopened.saved);
    assert_eq!(count_options(&db, &q.id).await, 1);
}

#[actix_rt::test]
#[serial]
async fn foreign_user_is_denied() {
    let db = setup_test_database().await;
    let owner = create_test_user(&db, "owner", "password123").await;
    let other = create_test_user(&db, "intruder", "password123").await;

    let form = builder::start_draft(&db, &owner.id).await.expect("draft");
    let q = builder::add_question(&db, &owner.id, &form.id)
        .await
        .expect("add");

    let err = builder::write_question(&db, &other.id, &q.id, "Hijack", "text")
        .await
        .expect_err("should be denied");
    assert!(matches!(err, FormError::AccessDenied));

    let err = builder::delete_form(&db, &other.id, &form.id)
        .await
        .expect_err("should be denied");
    assert!(matches!(err, FormError::AccessDenied));

    // Denied operations change nothing.
    assert!(!reload_question(&db, &q.id).await.saved);
}

#[actix_rt::test]
#[serial]
async fn invalid_answer_type_is_rejected() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = builder::start_draft(&db, &user.id).await.expect("draft");
    let q = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");

    let err = builder::write_question(&db, &user.id, &q.id, "Q", "essay")
        .await
        .expect_err("should be rejected");
    assert!(matches!(err, FormError::ValidationFailed(_)));
    assert!(!reload_question(&db, &q.id).await.saved);
}

#[actix_rt::test]
#[serial]
async fn text_questions_cannot_take_options() {
    let db = setup_test_database().await;
    let user = create_test_user(&db, "author", "password123").await;

    let form = builder::start_draft(&db, &user.id).await.expect("draft");
    let q = builder::add_question(&db, &user.id, &form.id)
        .await
        .expect("add");
    builder::write_question(&db, &user.id, &q.id, "Name?", "text")
        .await
        .expect("write");

    let err = builder::add_option(&db, &user.id, &q.id, Some("text"))
        .await
        .expect_err("should be rejected");
    assert!(matches!(err, FormError::ValidationFailed(_)));
    assert_eq!(count_options(&db, &q.id).await, 0);
}
