//! Student model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: i32,
    /// Numeric identifier the student also logs in with
    pub child_id: Option<i64>,
    pub name: String,
    pub centre_id: Option<i32>,
    pub school_id: Option<i32>,
    pub grade_id: Option<i32>,
    pub user_id: Option<i32>,
}

/// Student with resolved school and grade names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StudentShort {
    pub id: i32,
    pub child_id: Option<i64>,
    pub name: String,
    pub centre_id: Option<i32>,
    pub school_name: Option<String>,
    pub grade_name: Option<String>,
    pub user_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct StudentQuery {
    /// Matches name or child ID
    pub search: Option<String>,
    pub school_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateStudent {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(range(min = 1, message = "Child ID must be positive"))]
    pub child_id: Option<i64>,
    pub centre_id: Option<i32>,
    pub school_id: Option<i32>,
    pub grade_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStudent {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "Child ID must be positive"))]
    pub child_id: Option<i64>,
    pub school_id: Option<i32>,
    pub grade_id: Option<i32>,
}

/// Creates a linked `student` login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStudentAccount {
    /// Generated from the child ID when omitted
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Placeholder address for student accounts created without an email
pub fn student_account_email(child_id: Option<i64>, student_id: i32) -> String {
    match child_id {
        Some(child) => format!("student{}@students.libraryhub.local", child),
        None => format!("student-{}@students.libraryhub.local", student_id),
    }
}

/// Splits a student's full name into first and last name
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_split() {
        assert_eq!(split_name("Amina Wanjiru Otieno"), ("Amina".into(), "Wanjiru Otieno".into()));
        assert_eq!(split_name("  Baraka "), ("Baraka".into(), String::new()));
    }

    #[test]
    fn generated_email_uses_child_id() {
        assert_eq!(student_account_email(Some(1042), 9), "student1042@students.libraryhub.local");
        assert_eq!(student_account_email(None, 9), "student-9@students.libraryhub.local");
    }
}
