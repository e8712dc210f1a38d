use actix_web::error::JsonPayloadError;
use actix_web::{web, HttpRequest, HttpResponse};

use crate::classifier::TextClassifier;
use crate::errors::ApiError;
use crate::models::{PredictRequest, PredictResponse};

pub async fn predict(
    classifier: web::Data<dyn TextClassifier>,
    payload: web::Json<PredictRequest>,
) -> Result<HttpResponse, ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::EmptyText);
    }

    let prediction = classifier.predict(text).map_err(|err| {
        log::error!("Prediction failed: {}", err);
        err
    })?;
    log::debug!(
        "Predicted class {} from {} input chars",
        prediction.predicted_class,
        text.chars().count()
    );

    Ok(HttpResponse::Ok().json(PredictResponse {
        predicted_class: prediction.predicted_class,
        probabilities: prediction.probabilities,
    }))
}

/// Bodies the JSON extractor rejects (bad syntax, wrong content type, size
/// cap) are prediction failures on the wire, not 400s.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::error!("Rejected request body: {}", err);
    ApiError::Payload(err.to_string()).into()
}
