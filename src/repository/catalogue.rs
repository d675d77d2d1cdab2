//! Catalogue repository: shelf locations per centre

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        catalogue::{CatalogueDetails, CatalogueEntry},
        Page,
    },
};

use super::like_pattern;

const DETAILS_SELECT: &str = r#"
    SELECT ct.id, ct.book_id, bk.title AS book_title, bk.author AS book_author,
           bk.book_code, ct.shelf_number, ct.centre_id, ct.added_by, ct.added_date, ct.notes
    FROM catalogue ct
    JOIN books bk ON bk.id = ct.book_id
"#;

#[derive(Clone)]
pub struct CatalogueRepository {
    pool: Pool<Postgres>,
}

impl CatalogueRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<CatalogueEntry> {
        sqlx::query_as::<_, CatalogueEntry>("SELECT * FROM catalogue WHERE id = $1 AND is_active")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Catalogue entry with id {} not found", id)))
    }

    pub async fn get_details(&self, id: i32) -> AppResult<CatalogueDetails> {
        sqlx::query_as::<_, CatalogueDetails>(&format!(
            "{} WHERE ct.id = $1 AND ct.is_active",
            DETAILS_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Catalogue entry with id {} not found", id)))
    }

    /// Entry of a book in a centre, active or not
    pub async fn find_for_book(
        &self,
        book_id: i32,
        centre_id: Option<i32>,
    ) -> AppResult<Option<CatalogueEntry>> {
        let entry = sqlx::query_as::<_, CatalogueEntry>(
            "SELECT * FROM catalogue WHERE book_id = $1 AND centre_id IS NOT DISTINCT FROM $2",
        )
        .bind(book_id)
        .bind(centre_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Shelf of a book in its centre, if catalogued
    pub async fn shelf_for_book(&self, book_id: i32, centre_id: Option<i32>) -> AppResult<Option<String>> {
        Ok(self
            .find_for_book(book_id, centre_id)
            .await?
            .filter(|entry| entry.is_active)
            .map(|entry| entry.shelf_number))
    }

    /// Whether an active entry of the centre already uses the shelf
    pub async fn shelf_taken(
        &self,
        shelf_number: &str,
        centre_id: Option<i32>,
        exclude_id: Option<i32>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM catalogue
                WHERE LOWER(shelf_number) = LOWER($1)
                  AND centre_id IS NOT DISTINCT FROM $2
                  AND is_active
                  AND ($3::int IS NULL OR id != $3)
            )
            "#,
        )
        .bind(shelf_number)
        .bind(centre_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(
        &self,
        book_id: i32,
        shelf_number: &str,
        centre_id: Option<i32>,
        added_by: i32,
        notes: &str,
    ) -> AppResult<CatalogueEntry> {
        let entry = sqlx::query_as::<_, CatalogueEntry>(
            r#"
            INSERT INTO catalogue (book_id, shelf_number, centre_id, added_by, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(shelf_number)
        .bind(centre_id)
        .bind(added_by)
        .bind(notes.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Set shelf and notes; also reactivates a removed entry
    pub async fn update(
        &self,
        id: i32,
        shelf_number: &str,
        notes: Option<&str>,
    ) -> AppResult<CatalogueEntry> {
        sqlx::query_as::<_, CatalogueEntry>(
            r#"
            UPDATE catalogue SET shelf_number = $2, notes = COALESCE($3, notes), is_active = TRUE
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(shelf_number)
        .bind(notes.map(str::trim))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Catalogue entry with id {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM catalogue WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Catalogue entry with id {} not found", id)));
        }
        Ok(())
    }

    /// Active entries ordered by shelf
    pub async fn search(
        &self,
        search: Option<&str>,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<CatalogueDetails>, i64)> {
        let pattern = like_pattern(search);
        let filter = r#"
            WHERE ct.is_active
              AND ($1::text IS NULL
                   OR LOWER(bk.title) LIKE $1
                   OR LOWER(bk.author) LIKE $1
                   OR LOWER(ct.shelf_number) LIKE $1)
              AND ($2::int IS NULL OR ct.centre_id = $2)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM catalogue ct JOIN books bk ON bk.id = ct.book_id {}",
            filter
        ))
        .bind(&pattern)
        .bind(centre_id)
        .fetch_one(&self.pool)
        .await?;

        let entries = sqlx::query_as::<_, CatalogueDetails>(&format!(
            "{} {} ORDER BY ct.shelf_number, bk.title LIMIT $3 OFFSET $4",
            DETAILS_SELECT, filter
        ))
        .bind(&pattern)
        .bind(centre_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((entries, total))
    }
}
