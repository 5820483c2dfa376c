use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hive_work::WorkError;
use serde::Serialize;
use tracing::{error, warn};

/// Envelope every endpoint answers with
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    MissingHeader(&'static str),
    Internal(String),
}

impl From<WorkError> for ApiError {
    fn from(e: WorkError) -> Self {
        match e {
            WorkError::MalformedRequest(_) | WorkError::AuthenticationFailure(_) => {
                ApiError::Unauthorized(e.to_string())
            }
            WorkError::StateConflict(_) => ApiError::Conflict(e.to_string()),
            WorkError::NotFound(_) => ApiError::NotFound(e.to_string()),
            WorkError::Transport(_) | WorkError::Storage(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => {
                warn!(reason = %msg, "Request rejected");
                (StatusCode::UNAUTHORIZED, msg)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, format!("Missing header: {}", header))
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = ApiResponse::<()> {
            success: false,
            message,
            data: None,
        };
        (status, Json(body)).into_response()
    }
}
