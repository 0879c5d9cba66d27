//! Test fixtures for creating test data
#![allow(dead_code)]

use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use formbin::builder::{self, QuestionPayload};
use formbin::orm::forms;
use sea_orm::DatabaseConnection;

/// Test user fixture
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub password: String, // Plain text password for testing
}

/// Create a test user with known credentials
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> TestUser {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = formbin::session::get_argon2()
        .hash_password(password.as_bytes(), &salt)
        .expect("Password hashing failed")
        .to_string();

    let user = formbin::create_user::insert_new_user(db, username, &password_hash)
        .await
        .expect("Failed to create test user");

    TestUser {
        id: user.id,
        username: username.to_string(),
        password: password.to_string(),
    }
}

/// Shorthand for a batch-save question payload.
pub fn question(text: &str, answer_type: &str, options: &[&str]) -> QuestionPayload {
    QuestionPayload {
        text: text.to_string(),
        answer_type: answer_type.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
    }
}

/// Draft + batch save in one step; returns the finalized form.
pub async fn create_published_form(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    title: &str,
    questions: &[QuestionPayload],
) -> forms::Model {
    let draft = builder::start_draft(db, user_id)
        .await
        .expect("Failed to start draft");

    builder::save_form(db, user_id, &draft.id, name, title, questions)
        .await
        .expect("Failed to save form")
}
