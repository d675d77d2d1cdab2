//! Students repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        student::{CreateStudent, Student, StudentQuery, StudentShort, UpdateStudent},
        Page,
    },
};

use super::{
    like_pattern,
    users::{NewUser, UsersRepository},
};

#[derive(Clone)]
pub struct StudentsRepository {
    pool: Pool<Postgres>,
}

impl StudentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Student> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", id)))
    }

    pub async fn child_id_exists(&self, child_id: i64, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM students WHERE child_id = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(child_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Search students of a centre (`None` = all centres)
    pub async fn search(
        &self,
        query: &StudentQuery,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<StudentShort>, i64)> {
        let pattern = like_pattern(query.search.as_deref());
        let filter = r#"
            WHERE ($1::text IS NULL
                   OR LOWER(st.name) LIKE $1
                   OR CAST(st.child_id AS TEXT) LIKE $1)
              AND ($2::int IS NULL OR st.school_id = $2)
              AND ($3::int IS NULL OR st.centre_id = $3)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM students st {}", filter))
                .bind(&pattern)
                .bind(query.school_id)
                .bind(centre_id)
                .fetch_one(&self.pool)
                .await?;

        let students = sqlx::query_as::<_, StudentShort>(&format!(
            r#"
            SELECT st.id, st.child_id, st.name, st.centre_id,
                   sc.name AS school_name, g.name AS grade_name, st.user_id
            FROM students st
            LEFT JOIN schools sc ON sc.id = st.school_id
            LEFT JOIN grades g ON g.id = st.grade_id
            {}
            ORDER BY st.name, st.id
            LIMIT $4 OFFSET $5
            "#,
            filter
        ))
        .bind(&pattern)
        .bind(query.school_id)
        .bind(centre_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((students, total))
    }

    pub async fn create(&self, student: &CreateStudent, centre_id: Option<i32>) -> AppResult<Student> {
        let created = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (child_id, name, centre_id, school_id, grade_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(student.child_id)
        .bind(student.name.trim())
        .bind(centre_id)
        .bind(student.school_id)
        .bind(student.grade_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i32,
        update: &UpdateStudent,
        centre_id: Option<i32>,
    ) -> AppResult<Student> {
        sqlx::query_as::<_, Student>(
            r#"
            UPDATE students SET
                name = COALESCE($2, name),
                child_id = COALESCE($3, child_id),
                school_id = COALESCE($4, school_id),
                grade_id = COALESCE($5, grade_id),
                centre_id = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.child_id)
        .bind(update.school_id)
        .bind(update.grade_id)
        .bind(centre_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Student with id {} not found", id)));
        }
        Ok(())
    }

    /// Creates the login account and links it to the student atomically
    pub async fn create_account(&self, student_id: i32, user: &NewUser) -> AppResult<Student> {
        let mut tx = self.pool.begin().await?;

        let linked: Option<Option<i32>> =
            sqlx::query_scalar("SELECT user_id FROM students WHERE id = $1 FOR UPDATE")
                .bind(student_id)
                .fetch_optional(&mut *tx)
                .await?;
        match linked {
            None => {
                return Err(AppError::NotFound(format!(
                    "Student with id {} not found",
                    student_id
                )))
            }
            Some(Some(_)) => {
                return Err(AppError::Conflict(
                    "This student already has a user account".to_string(),
                ))
            }
            Some(None) => {}
        }

        let account = UsersRepository::insert(&mut *tx, user).await?;

        let student = sqlx::query_as::<_, Student>(
            "UPDATE students SET user_id = $2 WHERE id = $1 RETURNING *",
        )
        .bind(student_id)
        .bind(account.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(student)
    }
}
