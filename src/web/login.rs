//! Session login.

use crate::db::get_db_pool;
use crate::orm::users;
use crate::session::{get_argon2, KEY_USER_ID};
use actix_web::{error, post, web, Error, HttpResponse, Responder};
use argon2::password_hash::{PasswordHash, PasswordVerifier};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login);
}

#[derive(Deserialize)]
pub struct FormData {
    username: String,
    password: String,
}

#[derive(Debug)]
pub enum LoginResultStatus {
    Success,
    BadName,
    BadPassword,
}

pub struct LoginResult {
    pub result: LoginResultStatus,
    pub user: Option<users::Model>,
}

impl LoginResult {
    fn success(user: users::Model) -> Self {
        Self {
            result: LoginResultStatus::Success,
            user: Some(user),
        }
    }

    fn fail(result: LoginResultStatus) -> Self {
        Self { result, user: None }
    }
}

pub async fn login(db: &DatabaseConnection, name: &str, pass: &str) -> Result<LoginResult, DbErr> {
    let user = users::Entity::find()
        .filter(users::Column::Username.eq(name))
        .one(db)
        .await?;

    let user = match user {
        Some(user) => user,
        None => return Ok(LoginResult::fail(LoginResultStatus::BadName)),
    };

    let parsed_hash = match PasswordHash::new(&user.password) {
        Ok(hash) => hash,
        Err(err) => {
            log::error!("stored hash unparseable for user {}: {}", user.id, err);
            return Ok(LoginResult::fail(LoginResultStatus::BadPassword));
        }
    };

    if get_argon2()
        .verify_password(pass.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Ok(LoginResult::fail(LoginResultStatus::BadPassword));
    }

    Ok(LoginResult::success(user))
}

#[post("/login")]
pub async fn post_login(
    session: actix_session::Session,
    form: web::Json<FormData>,
) -> Result<impl Responder, Error> {
    let outcome = login(get_db_pool(), &form.username, &form.password)
        .await
        .map_err(|e| {
            log::error!("error {:?}", e);
            error::ErrorInternalServerError("DB error")
        })?;

    let user = match outcome.result {
        LoginResultStatus::Success => outcome.user.ok_or_else(|| {
            error::ErrorInternalServerError("login succeeded without a user record")
        })?,
        LoginResultStatus::BadName | LoginResultStatus::BadPassword => {
            log::debug!("login failure: {:?} for {}", outcome.result, form.username);
            // Generic message to avoid username enumeration.
            return Err(error::ErrorUnauthorized("Invalid username or password."));
        }
    };

    session
        .insert(KEY_USER_ID, user.id.clone())
        .map_err(|_| error::ErrorInternalServerError("middleware error"))?;
    session.renew();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user_id": user.id,
        "username": user.username,
    })))
}
