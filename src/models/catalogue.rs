//! Catalogue: shelf location of a book within a centre

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CatalogueEntry {
    pub id: i32,
    pub book_id: i32,
    pub shelf_number: String,
    pub centre_id: Option<i32>,
    pub added_by: Option<i32>,
    pub added_date: DateTime<Utc>,
    pub notes: String,
    pub is_active: bool,
}

/// Entry joined with its book
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CatalogueDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_author: String,
    pub book_code: String,
    pub shelf_number: String,
    pub centre_id: Option<i32>,
    pub added_by: Option<i32>,
    pub added_date: DateTime<Utc>,
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCatalogue {
    pub book_id: Option<i32>,
    #[validate(length(max = 50, message = "Shelf number is too long"))]
    pub shelf_number: Option<String>,
    /// Defaults to the book's centre
    pub centre_id: Option<i32>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCatalogue {
    #[validate(length(min = 1, max = 50, message = "Shelf number is required"))]
    pub shelf_number: String,
    pub notes: Option<String>,
}

/// Whether an add created a new entry or moved an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CatalogueOutcome {
    Created,
    Updated,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogueResponse {
    pub outcome: CatalogueOutcome,
    pub message: String,
    pub entry: CatalogueEntry,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CatalogueQuery {
    /// Matches title, author or shelf number
    pub search: Option<String>,
    pub centre_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CentreBooksQuery {
    pub centre_id: Option<i32>,
}

/// Trims the shelf number; blank counts as missing
pub fn normalise_shelf(shelf: Option<&str>) -> Option<String> {
    shelf
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shelf_numbers_are_trimmed() {
        assert_eq!(normalise_shelf(Some(" A-3 ")), Some("A-3".to_string()));
        assert_eq!(normalise_shelf(Some("   ")), None);
        assert_eq!(normalise_shelf(None), None);
    }
}
