//! Centres, schools and reference tables

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::organisation::{
        Category, Centre, CentreDetails, CentreInput, CreateSchool, CreateSubject, Grade, School,
        Subject, SubjectQuery,
    },
};

#[derive(Clone)]
pub struct OrganisationRepository {
    pool: Pool<Postgres>,
}

impl OrganisationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list_centres(&self) -> AppResult<Vec<Centre>> {
        let centres = sqlx::query_as::<_, Centre>("SELECT * FROM centres ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(centres)
    }

    pub async fn get_centre(&self, id: i32) -> AppResult<Centre> {
        sqlx::query_as::<_, Centre>("SELECT * FROM centres WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Centre with id {} not found", id)))
    }

    /// Centre with its school and book counts
    pub async fn get_centre_details(&self, id: i32) -> AppResult<CentreDetails> {
        sqlx::query_as::<_, CentreDetails>(
            r#"
            SELECT c.id, c.name, c.centre_code,
                   (SELECT COUNT(*) FROM schools s WHERE s.centre_id = c.id) AS school_count,
                   (SELECT COUNT(*) FROM books b WHERE b.centre_id = c.id) AS book_count
            FROM centres c
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Centre with id {} not found", id)))
    }

    pub async fn centre_code_exists(&self, code: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM centres WHERE centre_code = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create_centre(&self, input: &CentreInput) -> AppResult<Centre> {
        let centre = sqlx::query_as::<_, Centre>(
            "INSERT INTO centres (name, centre_code) VALUES ($1, $2) RETURNING *",
        )
        .bind(input.name.trim())
        .bind(input.centre_code.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(centre)
    }

    pub async fn update_centre(&self, id: i32, input: &CentreInput) -> AppResult<Centre> {
        sqlx::query_as::<_, Centre>(
            "UPDATE centres SET name = $2, centre_code = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.centre_code.trim())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Centre with id {} not found", id)))
    }

    pub async fn delete_centre(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM centres WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Centre with id {} not found", id)));
        }
        Ok(())
    }

    pub async fn list_schools(&self, centre_id: Option<i32>) -> AppResult<Vec<School>> {
        let schools = sqlx::query_as::<_, School>(
            "SELECT * FROM schools WHERE ($1::int IS NULL OR centre_id = $1) ORDER BY name",
        )
        .bind(centre_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(schools)
    }

    pub async fn get_school(&self, id: i32) -> AppResult<School> {
        sqlx::query_as::<_, School>("SELECT * FROM schools WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("School with id {} not found", id)))
    }

    /// Case-insensitive lookup used by the student import
    pub async fn find_school_by_name(
        &self,
        centre_id: Option<i32>,
        name: &str,
    ) -> AppResult<Option<School>> {
        let school = sqlx::query_as::<_, School>(
            r#"
            SELECT * FROM schools
            WHERE LOWER(name) = LOWER($1) AND ($2::int IS NULL OR centre_id = $2)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(name.trim())
        .bind(centre_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(school)
    }

    pub async fn create_school(&self, input: &CreateSchool) -> AppResult<School> {
        let school_code = input
            .school_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let school = sqlx::query_as::<_, School>(
            "INSERT INTO schools (name, school_code, centre_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(input.name.trim())
        .bind(school_code)
        .bind(input.centre_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(school)
    }

    pub async fn list_grades(&self) -> AppResult<Vec<Grade>> {
        let grades = sqlx::query_as::<_, Grade>("SELECT * FROM grades ORDER BY sort_order, name")
            .fetch_all(&self.pool)
            .await?;
        Ok(grades)
    }

    pub async fn find_grade_by_name(&self, name: &str) -> AppResult<Option<Grade>> {
        let grade = sqlx::query_as::<_, Grade>("SELECT * FROM grades WHERE LOWER(name) = LOWER($1)")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(grade)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn find_category_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let category =
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE LOWER(name) = LOWER($1)")
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(category)
    }

    pub async fn list_subjects(&self, query: &SubjectQuery) -> AppResult<Vec<Subject>> {
        let subjects = sqlx::query_as::<_, Subject>(
            r#"
            SELECT s.* FROM subjects s
            LEFT JOIN grades g ON g.id = s.grade_id
            WHERE ($1::int IS NULL OR s.grade_id = $1)
              AND ($2::int IS NULL OR s.category_id = $2)
            ORDER BY g.sort_order NULLS FIRST, s.name
            "#,
        )
        .bind(query.grade_id)
        .bind(query.category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subjects)
    }

    pub async fn get_subject(&self, id: i32) -> AppResult<Subject> {
        sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Subject with id {} not found", id)))
    }

    pub async fn create_subject(&self, input: &CreateSubject) -> AppResult<Subject> {
        let subject = sqlx::query_as::<_, Subject>(
            "INSERT INTO subjects (name, grade_id, category_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(input.name.trim())
        .bind(input.grade_id)
        .bind(input.category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(subject)
    }

    /// Inserts a grade unless one with that name exists. Returns rows inserted.
    pub async fn ensure_grade(&self, name: &str, sort_order: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "INSERT INTO grades (name, sort_order) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(sort_order)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn ensure_category(&self, name: &str) -> AppResult<u64> {
        let result =
            sqlx::query("INSERT INTO categories (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(name)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn ensure_subject(&self, name: &str, grade_id: i32, category_id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "INSERT INTO subjects (name, grade_id, category_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(name)
        .bind(grade_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
