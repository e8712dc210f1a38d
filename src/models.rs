use serde::{Deserialize, Serialize};

/// Body of `POST /predict`. A missing `text` key is read as the empty
/// string; any other fields are ignored.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_class: usize,
    pub probabilities: Vec<f32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
