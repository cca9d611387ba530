use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Field-level validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Like `extend`, but skips fields that already carry a message.
    pub fn extend_missing(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_insert(messages);
        }
    }

    pub fn remove(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// First message for a field, for inline display next to the input.
    pub fn message(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|m| m.first()).map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ok when nothing was recorded, so callers can `?` a batch of checks.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidFields(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = err.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Valor inválido ({}).", err.code));
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid fields: {0}")]
    InvalidFields(FieldErrors),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) | AppError::Email(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidToken | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) | AppError::InvalidFields(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Message that is safe to show to the requester. Internal failures are
    /// logged here and replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                "Database error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Email(msg) => {
                tracing::error!("Email error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::Validation(msg) => msg.clone(),
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::Forbidden => "Forbidden".to_string(),
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
            AppError::InvalidToken => "Invalid or expired token".to_string(),
            AppError::InvalidFields(errors) => errors.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AppError::InvalidFields(errors) => Json(json!({
                "error": "Validation error",
                "fields": errors,
            })),
            _ => Json(json!({
                "error": self.public_message(),
            })),
        };

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_collects_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("password1", "Too short.");
        errors.add("password1", "Too common.");
        errors.add("username", "Taken.");

        assert_eq!(errors.message("password1"), Some("Too short."));
        assert_eq!(errors.messages("password1").len(), 2);
        assert!(errors.contains("username"));
        assert_eq!(errors.message("email"), None);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_empty_field_errors_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = AppError::Database("UNIQUE constraint failed: members.secret".to_string());
        assert_eq!(err.public_message(), "Database error occurred");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
