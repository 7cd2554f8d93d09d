use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::detection::DetectionError;
use crate::sessions::SessionError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub is_operational: bool,
}

impl AppError {
    fn operational(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.to_string(),
            is_operational: true,
        }
    }

    pub fn bad_request(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::CONFLICT, code, message)
    }

    pub fn gone(code: &str, message: &str) -> Self {
        Self::operational(StatusCode::GONE, code, message)
    }

    pub fn too_many_requests(message: &str) -> Self {
        Self::operational(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message)
    }

    pub fn payload_too_large(message: &str) -> Self {
        Self::operational(StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", message)
    }

    pub fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.to_string(),
            is_operational: false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let exposed_message = if self.is_operational {
            self.message.clone()
        } else {
            "Internal server error".to_string()
        };

        if self.is_operational {
            tracing::warn!(status = %self.status, code = %self.code, error = %self.message, "API error");
        } else {
            tracing::error!(status = %self.status, code = %self.code, error = %self.message, "Internal API error");
        }

        (
            self.status,
            Json(ErrorBody {
                success: false,
                code: self.code,
                message: exposed_message,
                trace_id: None,
            }),
        )
            .into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        let message = value.to_string();
        match value {
            SessionError::LimitReached(_) => AppError::conflict("SESSION_LIMIT_REACHED", &message),
            SessionError::NotFound(_) => AppError::not_found(&message),
            SessionError::Closed(_) => AppError::gone("SESSION_CLOSED", &message),
        }
    }
}

impl From<DetectionError> for AppError {
    fn from(value: DetectionError) -> Self {
        AppError::bad_request("INVALID_PARAMETERS", &value.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(value: tokio::task::JoinError) -> Self {
        AppError::internal(&value.to_string())
    }
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data,
        }),
    )
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            data,
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use axum::response::IntoResponse;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn internal_error_is_redacted() {
        let resp = AppError::internal("loop thread exploded").into_response();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("exploded"));
        assert!(text.contains("Internal server error"));
    }

    #[tokio::test]
    async fn bad_request_keeps_message() {
        let resp = AppError::from(DetectionError::InvalidConsecFrames).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "INVALID_PARAMETERS");
        assert!(json["message"].as_str().unwrap().contains("at least 1"));
    }

    #[test]
    fn session_errors_map_to_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(AppError::from(SessionError::NotFound(id)).status, StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(SessionError::Closed(id)).status, StatusCode::GONE);
        assert_eq!(
            AppError::from(SessionError::LimitReached(4)).code,
            "SESSION_LIMIT_REACHED"
        );
    }
}
