//! Application error types and handling
//!
//! A unified error taxonomy for the survey engine. Every failure mode named by the
//! specification's error-handling design maps to a variant here; all errors convert
//! to a consistent JSON response shape at the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Consistent JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "malformed_key", "not_found")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level error details (for validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // Display-key and core domain errors
    #[error("malformed display key: {0}")]
    MalformedKey(String),

    #[error("unknown respondent: {0}")]
    UnknownRespondent(i64),

    #[error("unknown answer: {0}")]
    UnknownAnswer(String),

    #[error("invalid text value for question: {0}")]
    InvalidTextValue(String),

    #[error("REPEAT targeting a step is not implemented (relationship {0})")]
    UnimplementedRepeatStep(i64),

    // Database errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    #[error("validation errors")]
    ValidationWithDetails {
        message: String,
        details: HashMap<String, Vec<String>>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // Request errors
    #[error("bad request: {0}")]
    BadRequest(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedKey(_) => "malformed_key",
            Self::UnknownRespondent(_) => "unknown_respondent",
            Self::UnknownAnswer(_) => "unknown_answer",
            Self::InvalidTextValue(_) => "invalid_text_value",
            Self::UnimplementedRepeatStep(_) => "unimplemented_repeat_step",
            Self::Database(_) => "database_error",
            Self::StorageFailure(_) => "storage_failure",
            Self::Migration(_) => "migration_failed",
            Self::Validation(_) => "validation_error",
            Self::ValidationWithDetails { .. } => "validation_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
            Self::Serialization(_) => "serialization_error",
            Self::Anyhow(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedKey(_) => StatusCode::BAD_REQUEST,
            Self::UnknownRespondent(_) => StatusCode::NOT_FOUND,
            Self::UnknownAnswer(_) => StatusCode::NOT_FOUND,
            Self::InvalidTextValue(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UnimplementedRepeatStep(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ValidationWithDetails { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message; hides internal storage/config detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedKey(key) => format!("'{key}' is not a valid display key"),
            Self::UnknownRespondent(id) => format!("respondent {id} not found"),
            Self::UnknownAnswer(key) => format!("no answer at {key}"),
            Self::InvalidTextValue(msg) => msg.clone(),
            Self::UnimplementedRepeatStep(_) => {
                "REPEAT targeting a step is not supported".to_string()
            },
            Self::Database(_) => "a database error occurred".to_string(),
            Self::StorageFailure(_) => "storage is temporarily unavailable, please retry".to_string(),
            Self::Migration(_) => "a database error occurred".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::ValidationWithDetails { message, .. } => message.clone(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::NotFound(resource) => format!("{resource} not found"),
            Self::Conflict(msg) => msg.clone(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Internal(_) => "an internal error occurred".to_string(),
            Self::Configuration(_) => "server configuration error".to_string(),
            Self::Serialization(_) => "data processing error".to_string(),
            Self::Anyhow(_) => "an unexpected error occurred".to_string(),
        }
    }

    pub fn log_message(&self) -> String {
        format!("{self}")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            error_code = self.error_code(),
            status = %self.status_code(),
            details = %self.log_message(),
            "request error"
        );

        let status = self.status_code();
        let error_code = self.error_code().to_string();
        let message = self.user_message();

        let body = match &self {
            AppError::ValidationWithDetails { details, .. } => {
                ErrorResponse::with_details(error_code, message, details.clone())
            },
            _ => ErrorResponse::new(error_code, message),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(resource.into()))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: HashMap<String, Vec<String>> = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value for {field}"))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }

        AppError::ValidationWithDetails {
            message: "validation failed".to_string(),
            details,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_new_has_no_details() {
        let response = ErrorResponse::new("malformed_key", "bad key");
        assert_eq!(response.error, "malformed_key");
        assert!(response.details.is_none());
    }

    #[test]
    fn status_codes_match_spec_error_kinds() {
        assert_eq!(
            AppError::MalformedKey("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UnknownRespondent(1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::UnimplementedRepeatStep(1).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            AppError::StorageFailure("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let err = AppError::Internal("column foo does not exist".to_string());
        assert_eq!(err.user_message(), "an internal error occurred");
    }

    #[test]
    fn option_ext_ok_or_not_found() {
        let some_value: Option<i32> = Some(1);
        assert!(some_value.ok_or_not_found("Answer").is_ok());

        let none_value: Option<i32> = None;
        let result = none_value.ok_or_not_found("Answer");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
