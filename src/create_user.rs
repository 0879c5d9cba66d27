//! User registration.

use crate::db::get_db_pool;
use crate::error::FormError;
use crate::ident;
use crate::orm::users;
use crate::session::get_argon2;
use actix_web::{error, post, web, Error, HttpResponse};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    PasswordHasher,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Deserialize, Validate)]
pub struct FormData {
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[validate(length(min = 8, max = 1000))]
    pub password: String,
}

/// Inserts a new user with an already-hashed password. The username
/// uniqueness check and the insert are one transaction.
pub async fn insert_new_user(
    db: &DatabaseConnection,
    username: &str,
    password_hash: &str,
) -> Result<users::Model, FormError> {
    let txn = db.begin().await?;

    let taken = users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(&txn)
        .await?
        .is_some();
    if taken {
        return Err(FormError::invalid("Username already exists"));
    }

    let id = ident::allocate::<users::Entity, _>(&txn).await?;
    let user = users::ActiveModel {
        id: Set(id),
        username: Set(username.to_owned()),
        password: Set(password_hash.to_owned()),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(user)
}

#[post("/register")]
pub async fn create_user_post(
    session: actix_session::Session,
    form: web::Json<FormData>,
) -> Result<HttpResponse, Error> {
    form.validate().map_err(|e| {
        log::debug!("registration validation failed: {}", e);
        error::ErrorBadRequest("Invalid registration data")
    })?;

    let username = form.username.trim();

    let password_hash = get_argon2()
        .hash_password(form.password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map_err(|e| {
            log::error!("failed to hash password: {}", e);
            error::ErrorInternalServerError("Failed to create user")
        })?
        .to_string();

    let user = insert_new_user(get_db_pool(), username, &password_hash).await?;

    log::info!("new user registered: {} (user_id: {})", username, user.id);

    session
        .insert(crate::session::KEY_USER_ID, user.id.clone())
        .map_err(error::ErrorInternalServerError)?;
    session.renew();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user_id": user.id,
        "username": user.username,
    })))
}
