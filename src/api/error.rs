use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::data_models::ValidationError;
use crate::extractor::ExtractionError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Extraction(e) => match e {
                ExtractionError::Fetch { .. }
                | ExtractionError::Timeout(_)
                | ExtractionError::Parse(_)
                | ExtractionError::Incomplete { .. } => StatusCode::BAD_GATEWAY,
                ExtractionError::Browser(_) | ExtractionError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ApiError::Auth(e) => e.reason(),
            ApiError::Validation(_) => "validation_failed",
            ApiError::Extraction(e) => e.reason(),
            ApiError::Store(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = self.reason();

        // internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = match &self {
            ApiError::Extraction(ExtractionError::Incomplete { stored, .. }) => {
                json!({ "error": message, "reason": reason, "stored": stored })
            }
            _ => json!({ "error": message, "reason": reason }),
        };
        (status, Json(body)).into_response()
    }
}
