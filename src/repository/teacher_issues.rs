//! Teacher sub-loans repository

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        teacher_issue::{
            TeacherBookIssue, TeacherIssueDetails, TeacherIssueQuery, TeacherIssueStatus,
        },
        Page,
    },
};

use super::like_pattern;

const DETAILS_SELECT: &str = r#"
    SELECT t.id, t.parent_borrow_id, t.student_name, t.student_id, t.book_id,
           bk.title AS book_title, t.status, t.issue_date, t.expected_return_date,
           t.actual_return_date, t.notes
    FROM teacher_book_issues t
    JOIN books bk ON bk.id = t.book_id
"#;

/// Sub-loan row to insert
#[derive(Debug, Clone)]
pub struct NewTeacherIssue {
    pub parent_borrow_id: i32,
    pub teacher_id: i32,
    pub book_id: i32,
    pub student_name: String,
    pub student_id: String,
    pub issue_date: DateTime<Utc>,
    pub expected_return_date: DateTime<Utc>,
    pub notes: String,
}

#[derive(Clone)]
pub struct TeacherIssuesRepository {
    pool: Pool<Postgres>,
}

impl TeacherIssuesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Sub-loan owned by `teacher_id`; anything else is reported as missing
    pub async fn get_for_teacher(&self, id: i32, teacher_id: i32) -> AppResult<TeacherBookIssue> {
        sqlx::query_as::<_, TeacherBookIssue>(
            "SELECT * FROM teacher_book_issues WHERE id = $1 AND teacher_id = $2",
        )
        .bind(id)
        .bind(teacher_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Issue with id {} not found", id)))
    }

    /// Active sub-loan count per parent borrow
    pub async fn active_counts(&self, teacher_id: i32) -> AppResult<HashMap<i32, i64>> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r#"
            SELECT parent_borrow_id, COUNT(*)
            FROM teacher_book_issues
            WHERE teacher_id = $1 AND status = 'issued'
            GROUP BY parent_borrow_id
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn count_active(&self, teacher_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM teacher_book_issues WHERE teacher_id = $1 AND status = 'issued'",
        )
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn create(&self, issue: &NewTeacherIssue) -> AppResult<TeacherBookIssue> {
        let created = sqlx::query_as::<_, TeacherBookIssue>(
            r#"
            INSERT INTO teacher_book_issues (
                parent_borrow_id, teacher_id, student_name, student_id, book_id,
                status, issue_date, expected_return_date, notes
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(issue.parent_borrow_id)
        .bind(issue.teacher_id)
        .bind(issue.student_name.trim())
        .bind(issue.student_id.trim())
        .bind(issue.book_id)
        .bind(TeacherIssueStatus::Issued)
        .bind(issue.issue_date)
        .bind(issue.expected_return_date)
        .bind(issue.notes.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Sub-loans of a parent borrow, newest first
    pub async fn for_borrow(&self, parent_borrow_id: i32) -> AppResult<Vec<TeacherIssueDetails>> {
        let issues = sqlx::query_as::<_, TeacherIssueDetails>(&format!(
            "{} WHERE t.parent_borrow_id = $1 ORDER BY t.issue_date DESC, t.id DESC",
            DETAILS_SELECT
        ))
        .bind(parent_borrow_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(issues)
    }

    /// Returns `None` when the sub-loan was not in `issued`
    pub async fn mark_returned(
        &self,
        id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<TeacherBookIssue>> {
        let issue = sqlx::query_as::<_, TeacherBookIssue>(
            r#"
            UPDATE teacher_book_issues SET status = 'returned', actual_return_date = $2
            WHERE id = $1 AND status = 'issued'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(issue)
    }

    pub async fn update(
        &self,
        id: i32,
        student_name: Option<&str>,
        student_id: Option<&str>,
        notes: Option<&str>,
        expected_return_date: Option<DateTime<Utc>>,
    ) -> AppResult<TeacherBookIssue> {
        sqlx::query_as::<_, TeacherBookIssue>(
            r#"
            UPDATE teacher_book_issues SET
                student_name = COALESCE($2, student_name),
                student_id = COALESCE($3, student_id),
                notes = COALESCE($4, notes),
                expected_return_date = COALESCE($5, expected_return_date)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(student_name.map(str::trim))
        .bind(student_id.map(str::trim))
        .bind(notes.map(str::trim))
        .bind(expected_return_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Issue with id {} not found", id)))
    }

    /// All sub-loans of a teacher, newest first
    pub async fn search(
        &self,
        teacher_id: i32,
        query: &TeacherIssueQuery,
        page: Page,
    ) -> AppResult<(Vec<TeacherIssueDetails>, i64)> {
        let pattern = like_pattern(query.search.as_deref());
        let filter = r#"
            WHERE t.teacher_id = $1
              AND ($2::text IS NULL
                   OR LOWER(t.student_name) LIKE $2
                   OR LOWER(t.student_id) LIKE $2
                   OR LOWER(bk.title) LIKE $2)
              AND ($3::text IS NULL OR t.status = $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM teacher_book_issues t JOIN books bk ON bk.id = t.book_id {}",
            filter
        ))
        .bind(teacher_id)
        .bind(&pattern)
        .bind(query.status)
        .fetch_one(&self.pool)
        .await?;

        let issues = sqlx::query_as::<_, TeacherIssueDetails>(&format!(
            "{} {} ORDER BY t.issue_date DESC, t.id DESC LIMIT $4 OFFSET $5",
            DETAILS_SELECT, filter
        ))
        .bind(teacher_id)
        .bind(&pattern)
        .bind(query.status)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((issues, total))
    }
}
