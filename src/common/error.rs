// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already registered")]
    EmailAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing permission '{0}'")]
    Forbidden(&'static str),

    #[error("User not found")]
    UserNotFound,

    // Missing or soft-deleted rows. Callers treat it as "entity unavailable".
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Illegal {entity} transition from '{from}' to '{to}'")]
    IllegalTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Skip limit of {0} per billing period reached")]
    SkipLimitReached(i32),

    // Raised by repositories on unique index conflicts; generators retry on it.
    #[error("Unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("Could not generate a unique {0}")]
    IdentifierExhausted(&'static str),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Bcrypt error: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Turns a unique index violation into `UniqueConstraintViolation`,
    /// keeping every other database error as is.
    pub fn from_write(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return AppError::UniqueConstraintViolation(constraint);
            }
        }
        AppError::DatabaseError(e)
    }

    pub fn is_unique_violation_of(&self, constraint: &str) -> bool {
        matches!(self, AppError::UniqueConstraintViolation(c) if c == constraint)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidInput(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::EmailAlreadyExists => {
                (StatusCode::CONFLICT, "This email is already registered.".to_string())
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid email or password.".to_string())
            }
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Authentication token is invalid or missing.".to_string(),
            ),
            AppError::Forbidden(_)
            | AppError::IllegalTransition { .. }
            | AppError::Conflict(_)
            | AppError::SkipLimitReached(_) => {
                let status = match self {
                    AppError::Forbidden(_) => StatusCode::FORBIDDEN,
                    _ => StatusCode::CONFLICT,
                };
                (status, self.to_string())
            }
            AppError::UserNotFound | AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::IdentifierExhausted(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Please try again in a moment.".to_string(),
                )
            }

            // Everything else is a 500; the detailed message only goes to the log.
            ref e => {
                tracing::error!("Internal server error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_transition_is_a_conflict() {
        let err = AppError::IllegalTransition {
            entity: "pickup",
            from: "delivered",
            to: "scheduled",
        };
        assert_eq!(
            err.to_string(),
            "Illegal pickup transition from 'delivered' to 'scheduled'"
        );
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = AppError::NotFound("subscription").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unique_violation_matches_only_its_constraint() {
        let err = AppError::UniqueConstraintViolation("bags_qr_code_key".to_string());
        assert!(err.is_unique_violation_of("bags_qr_code_key"));
        assert!(!err.is_unique_violation_of("invoices_invoice_number_key"));
    }

    #[test]
    fn exhausted_generator_is_retryable_for_clients() {
        let response = AppError::IdentifierExhausted("qr_code").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
