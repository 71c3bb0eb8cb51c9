use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roomgate_services::auth::AuthError;
use roomgate_services::capacity::Occupancy;
use roomgate_services::AdmissionError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    InvalidTransition(String),
    RoomFull(Occupancy),
    Unavailable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    occupancy: Option<Occupancy>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut occupancy = None;
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, "invalid_transition", msg)
            }
            ApiError::RoomFull(current) => {
                occupancy = Some(current);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "room_full",
                    format!(
                        "Room is full ({} of {} places taken)",
                        current.count, current.max
                    ),
                )
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            occupancy,
        };

        (status, Json(body)).into_response()
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::RoomFull(occupancy) => ApiError::RoomFull(occupancy),
            AdmissionError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            AdmissionError::InvalidTransition(e) => ApiError::InvalidTransition(e.to_string()),
            // the identity is known but may not enter
            AdmissionError::Unauthorized(msg) | AdmissionError::Forbidden(msg) => {
                ApiError::Forbidden(msg)
            }
            AdmissionError::Conflict(msg) => ApiError::Conflict(msg),
            AdmissionError::Validation(msg) => ApiError::BadRequest(msg),
            AdmissionError::Unavailable(msg) => ApiError::Unavailable(msg),
            AdmissionError::Signing(e) => {
                error!(error = %e, "Grant signing failed");
                ApiError::Internal(e.to_string())
            }
            AdmissionError::Dao(e) => {
                error!(error = %e, "Store error");
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired => ApiError::Unauthorized("Token expired".to_string()),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}
