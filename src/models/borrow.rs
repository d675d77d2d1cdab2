//! Borrow model, status workflow and circulation DTOs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{reservation::ReservationDetails, Role, UserType};
use crate::error::{AppError, AppResult, ErrorCode};

/// Borrow lifecycle: requested, then issued, then returned.
/// Cancelled or rejected requests are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Requested,
    Issued,
    Returned,
}

text_enum!(BorrowStatus {
    Requested => "requested",
    Issued => "issued",
    Returned => "returned",
});

impl BorrowStatus {
    /// Fails with `InvalidStatus` unless the borrow is in `expected`
    pub fn expect(&self, expected: BorrowStatus, message: &str) -> AppResult<()> {
        if *self == expected {
            Ok(())
        } else {
            Err(AppError::rule(ErrorCode::InvalidStatus, message))
        }
    }
}

/// Borrow model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub centre_id: Option<i32>,
    pub status: BorrowStatus,
    pub request_date: DateTime<Utc>,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub renewals: i32,
    pub issued_by: Option<i32>,
    pub returned_to: Option<i32>,
    pub notes: String,
}

/// Borrow joined with its book and borrower, for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_author: String,
    pub book_code: String,
    pub user_id: i32,
    pub user_email: String,
    pub user_first_name: String,
    pub user_last_name: String,
    pub user_role: Role,
    pub centre_id: Option<i32>,
    pub status: BorrowStatus,
    pub request_date: DateTime<Utc>,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub renewals: i32,
    pub notes: String,
    pub is_overdue: bool,
}

/// `true` when a user with `active` borrows may request another one
pub fn can_borrow(limit: Option<i64>, active: i64) -> bool {
    limit.map_or(true, |limit| active < limit)
}

pub fn borrow_limit_reached(limit: i64) -> AppError {
    AppError::rule(
        ErrorCode::BorrowLimitReached,
        format!("You have reached your borrow limit of {} book(s)", limit),
    )
}

/// Validates an issue period against the configured maximum and returns
/// the due date.
pub fn due_date(from: DateTime<Utc>, days: i64, max_days: i64) -> AppResult<DateTime<Utc>> {
    if days < 1 || days > max_days {
        return Err(AppError::BadRequest(format!(
            "Loan period must be between 1 and {} days",
            max_days
        )));
    }
    Ok(from + Duration::days(days))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestBorrow {
    pub book_id: i32,
    #[validate(length(max = 500, message = "Notes are too long"))]
    pub notes: Option<String>,
}

/// What a borrow request produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestOutcome {
    Requested,
    Reserved,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BorrowRequestResponse {
    pub outcome: RequestOutcome,
    pub message: String,
    pub borrow: Option<Borrow>,
    pub reservation: Option<super::Reservation>,
}

/// Borrower's own circulation overview
#[derive(Debug, Serialize, ToSchema)]
pub struct MyBorrows {
    pub active: Vec<BorrowDetails>,
    pub returned: Vec<BorrowDetails>,
    pub reservations: Vec<ReservationDetails>,
    pub borrow_limit: Option<i64>,
    pub can_borrow_more: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IssueBorrow {
    /// Loan period; defaults to the configured value
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectBorrow {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkBookRequest {
    #[validate(length(min = 1, max = 100, message = "Select between 1 and 100 books"))]
    pub book_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkIssue {
    #[validate(length(min = 1, message = "Select at least one request"))]
    pub borrow_ids: Vec<i32>,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkReject {
    #[validate(length(min = 1, message = "Select at least one request"))]
    pub borrow_ids: Vec<i32>,
    pub reason: Option<String>,
}

/// Per-book result of a teacher bulk request or bulk reservation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkBookReport {
    pub processed: Vec<i32>,
    pub failed: Vec<super::BulkFailure>,
    pub message: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PendingQuery {
    /// Matches borrower name or email
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Only `overdue` is recognised as a status filter for active borrows
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ActiveBorrowQuery {
    #[serde(default)]
    pub user_type: UserType,
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ActiveBorrowQuery {
    pub fn overdue_only(&self) -> bool {
        self.status.as_deref() == Some("overdue")
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BorrowHistoryQuery {
    #[serde(default)]
    pub user_type: UserType,
    pub search: Option<String>,
    pub status: Option<BorrowStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TeacherBookQuery {
    pub q: Option<String>,
    pub category_id: Option<i32>,
    #[serde(default)]
    pub available_only: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Active borrows in a staff listing: flat for students, grouped for teachers
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActiveBorrowListing {
    Borrows(Vec<BorrowDetails>),
    Users(Vec<super::UserWithCount>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expect_reports_invalid_status() {
        assert!(BorrowStatus::Requested
            .expect(BorrowStatus::Requested, "processed")
            .is_ok());
        let err = BorrowStatus::Issued
            .expect(BorrowStatus::Requested, "already processed")
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(ErrorCode::InvalidStatus, _)));
    }

    #[test]
    fn borrow_limit_policy() {
        assert!(can_borrow(None, 500));
        assert!(can_borrow(Some(1), 0));
        assert!(!can_borrow(Some(1), 1));
        assert!(!can_borrow(Some(0), 0));

        assert!(matches!(
            borrow_limit_reached(1),
            AppError::BusinessRule(ErrorCode::BorrowLimitReached, ref msg)
                if msg == "You have reached your borrow limit of 1 book(s)"
        ));
    }

    #[test]
    fn due_date_range() {
        let now = Utc::now();
        assert_eq!(due_date(now, 3, 30).unwrap(), now + Duration::days(3));
        assert!(due_date(now, 0, 30).is_err());
        assert!(due_date(now, 31, 30).is_err());
        assert!(due_date(now, 30, 30).is_ok());
    }

    #[test]
    fn overdue_filter() {
        let query = ActiveBorrowQuery {
            status: Some("overdue".into()),
            ..ActiveBorrowQuery::default()
        };
        assert!(query.overdue_only());
        assert!(!ActiveBorrowQuery::default().overdue_only());
    }
}
