use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meadow_db::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

const OPAQUE_INTERNAL: &str = "the server encountered a problem";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
    #[error("{}", OPAQUE_INTERNAL)]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Store(StoreError::NotFound) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            ApiError::Store(err @ StoreError::Conflict) => {
                (StatusCode::CONFLICT, err.to_string())
            }
            // Duplicate email and username carry distinct messages so the
            // caller can show which field collided.
            ApiError::Store(
                err @ (StoreError::DuplicateEmail | StoreError::DuplicateUsername),
            ) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Store(err) => {
                error!("store fault: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, OPAQUE_INTERNAL.to_string())
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, OPAQUE_INTERNAL.to_string())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
