//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Full book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    /// Generated identifier, e.g. `NRB-S004-0012`
    pub book_id: Option<String>,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub book_code: String,
    pub publisher: String,
    pub year_of_publication: Option<i32>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub category_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub school_id: Option<i32>,
    pub centre_id: Option<i32>,
    pub added_by: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.is_active && self.available_copies > 0
    }
}

/// Short book representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub book_id: Option<String>,
    pub title: String,
    pub author: String,
    pub book_code: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub category_name: Option<String>,
    pub subject_name: Option<String>,
    pub centre_id: Option<i32>,
    pub is_active: bool,
}

/// Book with its shelf location when catalogued
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub is_available: bool,
    pub shelf_number: Option<String>,
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Matches title, author, book code, ISBN or book ID
    pub q: Option<String>,
    pub category_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub grade_id: Option<i32>,
    #[serde(default)]
    pub available_only: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub isbn: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Book code is required"))]
    pub book_code: String,
    #[serde(default)]
    pub publisher: String,
    pub year_of_publication: Option<i32>,
    #[validate(range(min = 1, message = "Total copies must be at least 1"))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0, message = "Available copies cannot be negative"))]
    pub available_copies: Option<i32>,
    pub category_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub school_id: Option<i32>,
    pub centre_id: Option<i32>,
}

/// Update book request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Book code cannot be empty"))]
    pub book_code: Option<String>,
    pub publisher: Option<String>,
    pub year_of_publication: Option<i32>,
    #[validate(range(min = 1, message = "Total copies must be at least 1"))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0, message = "Available copies cannot be negative"))]
    pub available_copies: Option<i32>,
    pub category_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub school_id: Option<i32>,
    pub is_active: Option<bool>,
}

/// Keeps `0 <= available <= total` and `total >= 1`
pub fn clamp_copies(total: i32, available: i32) -> (i32, i32) {
    let total = total.max(1);
    (total, available.clamp(0, total))
}

/// Formats a generated book ID from the centre code, the subject and the
/// sequence number.
pub fn format_book_id(centre_code: &str, subject_id: Option<i32>, number: i32) -> String {
    match subject_id {
        Some(subject) => format!("{}-S{:03}-{:04}", centre_code, subject, number),
        None => format!("{}-GEN-{:04}", centre_code, number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(available: i32, active: bool) -> Book {
        Book {
            id: 1,
            book_id: None,
            title: "Kifaru".into(),
            author: "A. Writer".into(),
            isbn: None,
            book_code: "KF-1".into(),
            publisher: String::new(),
            year_of_publication: None,
            total_copies: 2,
            available_copies: available,
            category_id: None,
            subject_id: None,
            school_id: None,
            centre_id: Some(1),
            added_by: None,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn availability_needs_active_and_copies() {
        assert!(book(1, true).is_available());
        assert!(!book(0, true).is_available());
        assert!(!book(2, false).is_available());
    }

    #[test]
    fn copies_are_clamped() {
        assert_eq!(clamp_copies(3, 5), (3, 3));
        assert_eq!(clamp_copies(3, -1), (3, 0));
        assert_eq!(clamp_copies(0, 0), (1, 0));
        assert_eq!(clamp_copies(4, 2), (4, 2));
    }

    #[test]
    fn book_id_format() {
        assert_eq!(format_book_id("NRB", Some(4), 12), "NRB-S004-0012");
        assert_eq!(format_book_id("MSA", None, 1), "MSA-GEN-0001");
        assert_eq!(format_book_id("MSA", Some(1234), 10000), "MSA-S1234-10000");
    }

    #[test]
    fn create_book_validation() {
        let request = CreateBook {
            title: "".into(),
            book_code: "X1".into(),
            ..CreateBook::default()
        };
        assert!(request.validate().is_err());

        let request = CreateBook {
            title: "Atlas".into(),
            book_code: "X1".into(),
            total_copies: Some(0),
            ..CreateBook::default()
        };
        assert!(request.validate().is_err());
    }
}
