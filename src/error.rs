use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Failures surfaced to the page. The display text is the user-facing message.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("This email is already on the waitlist")]
    DuplicateEmail,

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Store {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn store(source: StoreError) -> Self {
        AppError::Store {
            message: GENERIC_FAILURE,
            source,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store { source, .. } => {
                error!(error = %source, "store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (AppError::DuplicateEmail, StatusCode::CONFLICT),
            (AppError::NotFound("nope".into()), StatusCode::NOT_FOUND),
            (
                AppError::store(StoreError::Other(anyhow::anyhow!("db down"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn store_failures_hide_internal_detail() {
        let err = AppError::store(StoreError::Other(anyhow::anyhow!("connection refused")));
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }
}
