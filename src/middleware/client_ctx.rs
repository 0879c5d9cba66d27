//! Per-request client context.

use crate::session;
use actix_session::{Session, SessionExt};
use actix_web::dev::Payload;
use actix_web::{error, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};

/// Client data for a single request cycle. None is a guest.
#[derive(Clone, Debug, Default)]
pub struct ClientCtx {
    user_id: Option<String>,
}

impl ClientCtx {
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: session::user_id(session),
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_user(&self) -> bool {
        self.user_id.is_some()
    }

    /// Require user to be logged in. Returns the user id or ErrorUnauthorized.
    pub fn require_login(&self) -> Result<String, Error> {
        self.user_id
            .clone()
            .ok_or_else(|| error::ErrorUnauthorized("Login required"))
    }
}

/// This implementation is what actually provides the `client: ClientCtx`
/// in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let session = req.get_session();
        ready(Ok(ClientCtx::from_session(&session)))
    }
}
