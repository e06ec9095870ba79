// Error types for the API server and the single place where they become
// client-visible JSON.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::store::StoreError;

const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// API server error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    MethodNotAllowed(String),
    PayloadTooLarge(String),
    Validation {
        message: String,
        data: Option<Value>,
    },
    /// Detail is logged, never sent to the client.
    Internal(String),
}

#[derive(Serialize, Debug)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>, data: Value) -> Self {
        Self::Validation {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::NotFound(message)
            | Self::MethodNotAllowed(message)
            | Self::PayloadTooLarge(message) => {
                warn!(status = status.as_u16(), "Request failed: {}", message);
                ErrorBody {
                    message,
                    data: None,
                }
            }
            Self::Validation { message, data } => {
                warn!(status = status.as_u16(), ?data, "Request failed: {}", message);
                ErrorBody { message, data }
            }
            Self::Internal(detail) => {
                error!(status = status.as_u16(), "Internal error: {}", detail);
                ErrorBody {
                    message: INTERNAL_ERROR_MESSAGE.to_string(),
                    data: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("I/O error: {}", err))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(format!("Invalid multipart request: {}", err.body_text()))
        }
    }
}

// Router fallback for unmatched paths
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

// Fallback for a known path requested with a method it does not serve
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method Not Allowed".to_string())
}
