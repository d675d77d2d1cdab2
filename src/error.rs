//! Error types for LibraryHub server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    BookNotAvailable = 6,
    Duplicate = 7,
    BorrowLimitReached = 8,
    MaxRenewalsReached = 9,
    InvalidStatus = 10,
    BadValue = 11,
    /// Any other missing record (centre, borrow, reservation, ...)
    NoSuchData = 12,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User with id {0} not found")]
    NoSuchUser(i32),

    #[error("Book with id {0} not found")]
    NoSuchBook(i32),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// A circulation rule refused the operation
    #[error("Business rule violation: {1}")]
    BusinessRule(ErrorCode, String),
}

/// Client errors hidden behind Postgres error codes
fn constraint_violation(code: Option<&str>, constraint: Option<&str>) -> Option<AppError> {
    match code? {
        "23505" => Some(AppError::Conflict(format!(
            "Duplicate value violates {}",
            constraint.unwrap_or("unique constraint")
        ))),
        "23503" => Some(AppError::BadRequest(format!(
            "Referenced record does not exist ({})",
            constraint.unwrap_or("foreign key")
        ))),
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            if let Some(err) = constraint_violation(db.code().as_deref(), db.constraint()) {
                return err;
            }
        }
        AppError::Database(e)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl AppError {
    pub fn rule(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::BusinessRule(code, message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::NoSuchUser(_) | AppError::NoSuchBook(_)
        )
    }

    fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone()),
            AppError::NoSuchUser(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchUser, self.to_string()),
            AppError::NoSuchBook(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, self.to_string()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone()),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::BusinessRule(code, msg) => {
                let status = match code {
                    ErrorCode::InvalidStatus | ErrorCode::Duplicate => StatusCode::CONFLICT,
                    _ => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, *code, msg.clone())
            }
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rules_map_to_status() {
        let (status, code, _) =
            AppError::rule(ErrorCode::BorrowLimitReached, "limit").parts();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, ErrorCode::BorrowLimitReached);

        let (status, _, _) = AppError::rule(ErrorCode::InvalidStatus, "processed").parts();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_hide_details() {
        let (status, _, message) = AppError::Internal("smtp password wrong".into()).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn row_not_found_is_database_error() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn constraint_codes_are_client_errors() {
        let err = constraint_violation(Some("23505"), Some("books_code_centre_key")).unwrap();
        assert!(matches!(err, AppError::Conflict(ref msg) if msg.contains("books_code_centre_key")));

        let err = constraint_violation(Some("23503"), Some("books_category_id_fkey")).unwrap();
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, ErrorCode::BadValue);
        assert!(message.contains("books_category_id_fkey"));

        assert!(constraint_violation(Some("40001"), None).is_none());
        assert!(constraint_violation(None, None).is_none());
    }

    #[test]
    fn missing_users_and_books_have_their_own_codes() {
        let (status, code, message) = AppError::NoSuchUser(7).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, ErrorCode::NoSuchUser);
        assert_eq!(message, "User with id 7 not found");

        let (status, code, _) = AppError::NoSuchBook(3).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, ErrorCode::NoSuchBook);

        let (_, code, _) = AppError::NotFound("Centre with id 1 not found".into()).parts();
        assert_eq!(code, ErrorCode::NoSuchData);
        assert!(AppError::NoSuchBook(3).is_not_found());
    }

    #[test]
    fn authorization_is_forbidden() {
        let response = AppError::Authorization("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
