//! Centres, schools and the reference tables (grades, categories, subjects)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Centre {
    pub id: i32,
    pub name: String,
    pub centre_code: String,
}

/// Centre with its school and book counts
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CentreDetails {
    pub id: i32,
    pub name: String,
    pub centre_code: String,
    pub school_count: i64,
    pub book_count: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CentreInput {
    #[validate(length(min = 1, max = 200, message = "Centre name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "Centre code must be 1-20 characters"))]
    pub centre_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct School {
    pub id: i32,
    pub name: String,
    pub school_code: Option<String>,
    pub centre_id: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSchool {
    #[validate(length(min = 1, max = 200, message = "School name is required"))]
    pub name: String,
    pub school_code: Option<String>,
    pub centre_id: i32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SchoolQuery {
    pub centre_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Grade {
    pub id: i32,
    pub name: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Subject {
    pub id: i32,
    pub name: String,
    pub grade_id: Option<i32>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSubject {
    #[validate(length(min = 1, max = 200, message = "Subject name is required"))]
    pub name: String,
    pub grade_id: Option<i32>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SubjectQuery {
    pub grade_id: Option<i32>,
    pub category_id: Option<i32>,
}

/// Counts of rows inserted by the reference data seed
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SeedReport {
    pub grades: u64,
    pub categories: u64,
    pub subjects: u64,
}

pub const CATEGORY_NAMES: [&str; 10] = [
    "Textbook",
    "Fiction",
    "Non-Fiction",
    "Revision",
    "Reference",
    "Biography",
    "Science",
    "History",
    "Mathematics",
    "Literature",
];

/// Subjects created for every grade except Kindergarten, per category
pub const GRADED_SUBJECTS: [(&str, &[&str]); 4] = [
    (
        "Textbook",
        &[
            "Mathematics",
            "English",
            "Science",
            "Social Studies",
            "Kiswahili",
            "CRE",
            "IRE",
            "Hindu RE",
        ],
    ),
    (
        "Revision",
        &[
            "Math Revision",
            "English Revision",
            "Science Revision",
            "Kiswahili Revision",
        ],
    ),
    ("Fiction", &["Story Books", "Novels", "Poetry", "Drama"]),
    ("Reference", &["Dictionary", "Atlas", "Encyclopedia"]),
];

/// Kindergarten then Grade 1 to Grade 12, with their sort order
pub fn standard_grades() -> Vec<(String, i32)> {
    std::iter::once(("Kindergarten".to_string(), 0))
        .chain((1..=12).map(|n| (format!("Grade {}", n), n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_grades_are_ordered() {
        let grades = standard_grades();
        assert_eq!(grades.len(), 13);
        assert_eq!(grades[0], ("Kindergarten".to_string(), 0));
        assert_eq!(grades[12], ("Grade 12".to_string(), 12));
    }

    #[test]
    fn graded_subject_categories_exist() {
        for (category, subjects) in GRADED_SUBJECTS {
            assert!(CATEGORY_NAMES.contains(&category));
            assert!(!subjects.is_empty());
        }
    }
}
