#[cfg(feature = "web")]
use axum::http::StatusCode;
#[cfg(feature = "web")]
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::activity::ValidationError;
use crate::quotation::QuotationError;
use crate::store::StoreError;

/// Everything a request handler can fail with
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Quotation(#[from] QuotationError),
}

/// JSON body sent with every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Store(StoreError::NotFound { .. }) => 404,
            AppError::Store(_) | AppError::Quotation(_) => 500,
        }
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        (status, axum::Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(AppError::from(ValidationError::ProductLengthMismatch).status_code(), 400);
        assert_eq!(
            AppError::from(StoreError::Unavailable("connection refused".into())).status_code(),
            500
        );
        assert_eq!(
            AppError::from(StoreError::NotFound { table: "history", id: 3 }).status_code(),
            404
        );
    }

    #[test]
    fn message_passes_through() {
        let err = AppError::from(ValidationError::MissingField("status"));
        assert_eq!(err.to_string(), "Missing status");
    }

    #[cfg(feature = "web")]
    #[test]
    fn response_carries_status() {
        let response = AppError::from(StoreError::NotFound { table: "history", id: 3 }).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
