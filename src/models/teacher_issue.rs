//! Teacher sub-loans: books a teacher borrowed and passes on to a student

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::BorrowDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TeacherIssueStatus {
    Issued,
    Returned,
}

text_enum!(TeacherIssueStatus {
    Issued => "issued",
    Returned => "returned",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TeacherBookIssue {
    pub id: i32,
    pub parent_borrow_id: i32,
    pub teacher_id: i32,
    pub student_name: String,
    /// Free-text student identifier (admission number, child ID)
    pub student_id: String,
    pub book_id: i32,
    pub status: TeacherIssueStatus,
    pub issue_date: DateTime<Utc>,
    pub expected_return_date: DateTime<Utc>,
    pub actual_return_date: Option<DateTime<Utc>>,
    pub notes: String,
}

/// Sub-loan with the book title, for the teacher's listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TeacherIssueDetails {
    pub id: i32,
    pub parent_borrow_id: i32,
    pub student_name: String,
    pub student_id: String,
    pub book_id: i32,
    pub book_title: String,
    pub status: TeacherIssueStatus,
    pub issue_date: DateTime<Utc>,
    pub expected_return_date: DateTime<Utc>,
    pub actual_return_date: Option<DateTime<Utc>>,
    pub notes: String,
}

/// A teacher's issued borrow with its active sub-loan count
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeacherBook {
    #[serde(flatten)]
    pub borrow: BorrowDetails,
    pub issued_count: i64,
}

/// Parent borrow with its sub-loans split by status
#[derive(Debug, Serialize, ToSchema)]
pub struct ManagedBook {
    pub borrow: BorrowDetails,
    pub active: Vec<TeacherIssueDetails>,
    pub returned: Vec<TeacherIssueDetails>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IssueToStudent {
    #[validate(length(min = 1, max = 200, message = "Student name is required"))]
    pub student_name: String,
    #[serde(default)]
    pub student_id: String,
    #[validate(range(min = 1, max = 365, message = "Expected days must be between 1 and 365"))]
    pub expected_days: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTeacherIssue {
    #[validate(length(min = 1, max = 200, message = "Student name cannot be empty"))]
    pub student_name: Option<String>,
    pub student_id: Option<String>,
    pub notes: Option<String>,
    /// Recomputes the expected return date from the issue date
    #[validate(range(min = 1, max = 365, message = "Expected days must be between 1 and 365"))]
    pub expected_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TeacherIssueQuery {
    /// Matches student name, student id or book title
    pub search: Option<String>,
    pub status: Option<TeacherIssueStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub fn expected_return(issue_date: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    issue_date + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_return_adds_days() {
        let now = Utc::now();
        assert_eq!(expected_return(now, 7), now + Duration::days(7));
    }

    #[test]
    fn student_name_required() {
        let request = IssueToStudent {
            student_name: String::new(),
            student_id: String::new(),
            expected_days: None,
            notes: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
