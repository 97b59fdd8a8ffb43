//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::capacity::CapacityError;
use crate::scheduling::ScheduleError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Not found: {1}")]
    NotFound(&'static str, String),
    /// Admission refused because the resource is taken or exhausted.
    #[error("Conflict: {1}")]
    Conflict(&'static str, String),
    /// The target record is in a state that forbids the operation.
    #[error("Invalid state: {1}")]
    InvalidState(&'static str, String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    /// An external collaborator (code delivery, plan service) failed.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::NotFound(code, message) => (StatusCode::NOT_FOUND, code, message),
            ApiError::Conflict(code, message) => (StatusCode::CONFLICT, code, message),
            ApiError::InvalidState(code, message) => (StatusCode::BAD_REQUEST, code, message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            ApiError::Collaborator(detail) => {
                tracing::error!(detail, "collaborator failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "COLLABORATOR_FAILED",
                    "An external service failed; try again".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            code,
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::SessionNotFound => ApiError::InvalidState("SESSION_NOT_FOUND", message),
            AuthError::CodeExpired => ApiError::InvalidState("CODE_EXPIRED", message),
            AuthError::CodeAlreadyUsed => ApiError::InvalidState("CODE_ALREADY_USED", message),
            AuthError::TooManyAttempts => ApiError::InvalidState("TOO_MANY_ATTEMPTS", message),
            AuthError::InvalidCode => ApiError::InvalidState("INVALID_CODE", message),
            AuthError::Delivery(_) => ApiError::Collaborator(message),
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        let message = err.to_string();
        match err {
            ScheduleError::CaregiverNotFound => {
                ApiError::NotFound("CAREGIVER_NOT_FOUND", message)
            }
            ScheduleError::BookingNotFound => ApiError::NotFound("BOOKING_NOT_FOUND", message),
            ScheduleError::SlotAlreadyBooked { .. } => {
                ApiError::Conflict("SLOT_TAKEN", message)
            }
            ScheduleError::BookingClosed { .. } => {
                ApiError::InvalidState("BOOKING_CLOSED", message)
            }
        }
    }
}

impl From<CapacityError> for ApiError {
    fn from(err: CapacityError) -> Self {
        let message = err.to_string();
        match err {
            CapacityError::SpecialistNotFound => {
                ApiError::NotFound("SPECIALIST_NOT_FOUND", message)
            }
            CapacityError::PatientNotFound => ApiError::NotFound("PATIENT_NOT_FOUND", message),
            CapacityError::AssignmentNotFound => {
                ApiError::NotFound("ASSIGNMENT_NOT_FOUND", message)
            }
            CapacityError::CapacityExceeded { .. } => {
                ApiError::Conflict("CAPACITY_EXCEEDED", message)
            }
            CapacityError::AssignmentClosed { .. } => {
                ApiError::InvalidState("ASSIGNMENT_CLOSED", message)
            }
            CapacityError::PlanGeneration(_) => ApiError::Collaborator(message),
        }
    }
}
