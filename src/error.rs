//! Error taxonomy shared by the builder and respond modules.
//!
//! Double submission is deliberately absent: it is resolved by
//! idempotent replay in the respond layer, never surfaced as an error.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    /// An entity id did not resolve.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The acting user does not own the targeted form.
    #[error("access denied")]
    AccessDenied,

    /// Input rejected before any write. Carries the offending
    /// field/question message(s).
    #[error("{}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// Underlying persistence failure. The surrounding transaction has
    /// been rolled back.
    #[error("store failure: {0}")]
    Store(#[from] sea_orm::DbErr),
}

impl FormError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationFailed(vec![message.into()])
    }
}

impl ResponseError for FormError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::ValidationFailed(errors) => serde_json::json!({
                "success": false,
                "error": self.to_string(),
                "errors": errors,
            }),
            _ => serde_json::json!({
                "success": false,
                "error": self.to_string(),
            }),
        };

        if let Self::Store(err) = self {
            log::error!("store failure: {:?}", err);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
