use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::models::ErrorResponse;

/// Request-level failures, mapped onto the wire contract: empty input is the
/// caller's fault (400), everything else surfaces as a prediction failure
/// (500) with the underlying error in `details`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Empty text input")]
    EmptyText,
    #[error("malformed request body: {0}")]
    Payload(String),
    #[error(transparent)]
    Classify(#[from] ClassifierError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::EmptyText => StatusCode::BAD_REQUEST,
            ApiError::Payload(_) | ApiError::Classify(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::EmptyText => {
                HttpResponse::BadRequest().json(ErrorResponse::new("Empty text input"))
            }
            ApiError::Payload(details) => HttpResponse::InternalServerError()
                .json(ErrorResponse::with_details("Prediction failed", details.clone())),
            ApiError::Classify(err) => HttpResponse::InternalServerError()
                .json(ErrorResponse::with_details("Prediction failed", err.to_string())),
        }
    }
}
