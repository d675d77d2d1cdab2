//! Books repository: catalogue records, copy counts and generated book IDs

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{clamp_copies, format_book_id, Book, BookQuery, BookShort, CreateBook, UpdateBook},
        Page,
    },
};

use super::like_pattern;

/// Filters applied on top of a [`BookQuery`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BookFilter {
    /// `None` lists every centre
    pub centre_id: Option<i32>,
    pub active_only: bool,
}

const SHORT_SELECT: &str = r#"
    SELECT b.id, b.book_id, b.title, b.author, b.book_code, b.total_copies,
           b.available_copies, c.name AS category_name, s.name AS subject_name,
           b.centre_id, b.is_active
    FROM books b
    LEFT JOIN categories c ON c.id = b.category_id
    LEFT JOIN subjects s ON s.id = b.subject_id
"#;

const SEARCH_FILTER: &str = r#"
    WHERE ($1::text IS NULL
           OR LOWER(b.title) LIKE $1
           OR LOWER(b.author) LIKE $1
           OR LOWER(b.book_code) LIKE $1
           OR LOWER(COALESCE(b.isbn, '')) LIKE $1
           OR LOWER(COALESCE(b.book_id, '')) LIKE $1)
      AND ($2::int IS NULL OR b.category_id = $2)
      AND ($3::int IS NULL OR b.subject_id = $3)
      AND ($4::int IS NULL OR s.grade_id = $4)
      AND (NOT $5 OR (b.is_active AND b.available_copies > 0))
      AND ($6::int IS NULL OR b.centre_id = $6)
      AND (NOT $7 OR b.is_active)
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NoSuchBook(id))
    }

    /// Lock a book row for the rest of the transaction
    pub async fn lock(tx: &mut Transaction<'_, Postgres>, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NoSuchBook(id))
    }

    /// Search books with pagination, ordered by title
    pub async fn search(
        &self,
        query: &BookQuery,
        filter: BookFilter,
        page: Page,
    ) -> AppResult<(Vec<BookShort>, i64)> {
        let pattern = like_pattern(query.q.as_deref());

        let total: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*) FROM books b
            LEFT JOIN subjects s ON s.id = b.subject_id
            {}
            "#,
            SEARCH_FILTER
        ))
        .bind(&pattern)
        .bind(query.category_id)
        .bind(query.subject_id)
        .bind(query.grade_id)
        .bind(query.available_only)
        .bind(filter.centre_id)
        .bind(filter.active_only)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, BookShort>(&format!(
            "{} {} ORDER BY b.title, b.id LIMIT $8 OFFSET $9",
            SHORT_SELECT, SEARCH_FILTER
        ))
        .bind(&pattern)
        .bind(query.category_id)
        .bind(query.subject_id)
        .bind(query.grade_id)
        .bind(query.available_only)
        .bind(filter.centre_id)
        .bind(filter.active_only)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Check if a book code is already used in a centre
    pub async fn code_exists(
        &self,
        code: &str,
        centre_id: Option<i32>,
        exclude_id: Option<i32>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM books
                WHERE book_code = $1
                  AND centre_id IS NOT DISTINCT FROM $2
                  AND ($3::int IS NULL OR id != $3)
            )
            "#,
        )
        .bind(code.trim())
        .bind(centre_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a book. When it belongs to a centre its `book_id` is generated
    /// in the same transaction.
    pub async fn create(
        &self,
        book: &CreateBook,
        centre_id: Option<i32>,
        added_by: Option<i32>,
    ) -> AppResult<Book> {
        let total = book.total_copies.unwrap_or(1);
        let (total, available) = clamp_copies(total, book.available_copies.unwrap_or(total));

        let mut tx = self.pool.begin().await?;

        let book_id = match centre_id {
            Some(centre_id) => Some(Self::next_book_id(&mut tx, centre_id, book.subject_id).await?),
            None => None,
        };

        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                book_id, title, author, isbn, book_code, publisher, year_of_publication,
                total_copies, available_copies, category_id, subject_id, school_id,
                centre_id, added_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(book.isbn.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .bind(book.book_code.trim())
        .bind(book.publisher.trim())
        .bind(book.year_of_publication)
        .bind(total)
        .bind(available)
        .bind(book.category_id)
        .bind(book.subject_id)
        .bind(book.school_id)
        .bind(centre_id)
        .bind(added_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Next sequential book ID for (centre, subject). The sequence row is
    /// created if missing and locked until the transaction ends.
    async fn next_book_id(
        tx: &mut Transaction<'_, Postgres>,
        centre_id: i32,
        subject_id: Option<i32>,
    ) -> AppResult<String> {
        let centre_code: String = sqlx::query_scalar("SELECT centre_code FROM centres WHERE id = $1")
            .bind(centre_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Centre with id {} not found", centre_id)))?;

        let subject_key = subject_id.unwrap_or(0);

        sqlx::query(
            r#"
            INSERT INTO book_id_sequences (centre_id, subject_key, last_number)
            VALUES ($1, $2, 0)
            ON CONFLICT (centre_id, subject_key) DO NOTHING
            "#,
        )
        .bind(centre_id)
        .bind(subject_key)
        .execute(&mut **tx)
        .await?;

        let last: i32 = sqlx::query_scalar(
            "SELECT last_number FROM book_id_sequences WHERE centre_id = $1 AND subject_key = $2 FOR UPDATE",
        )
        .bind(centre_id)
        .bind(subject_key)
        .fetch_one(&mut **tx)
        .await?;

        let next = last + 1;
        sqlx::query(
            "UPDATE book_id_sequences SET last_number = $3 WHERE centre_id = $1 AND subject_key = $2",
        )
        .bind(centre_id)
        .bind(subject_key)
        .bind(next)
        .execute(&mut **tx)
        .await?;

        Ok(format_book_id(&centre_code, subject_id, next))
    }

    /// Update an existing book; copy counts are clamped against each other.
    /// The row is locked first so a concurrent issue or return is not
    /// overwritten by stale counts.
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock(&mut tx, id).await?;
        let (total, available) = clamp_copies(
            update.total_copies.unwrap_or(current.total_copies),
            update.available_copies.unwrap_or(current.available_copies),
        );

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                book_code = COALESCE($5, book_code),
                publisher = COALESCE($6, publisher),
                year_of_publication = COALESCE($7, year_of_publication),
                total_copies = $8,
                available_copies = $9,
                category_id = COALESCE($10, category_id),
                subject_id = COALESCE($11, subject_id),
                school_id = COALESCE($12, school_id),
                is_active = COALESCE($13, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref().map(str::trim))
        .bind(update.author.as_deref().map(str::trim))
        .bind(update.isbn.as_deref().map(str::trim))
        .bind(update.book_code.as_deref().map(str::trim))
        .bind(update.publisher.as_deref().map(str::trim))
        .bind(update.year_of_publication)
        .bind(total)
        .bind(available)
        .bind(update.category_id)
        .bind(update.subject_id)
        .bind(update.school_id)
        .bind(update.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NoSuchBook(id));
        }
        Ok(())
    }

    /// Active books of a centre without an active catalogue entry there
    pub async fn uncatalogued(&self, centre_id: i32) -> AppResult<Vec<BookShort>> {
        let books = sqlx::query_as::<_, BookShort>(&format!(
            r#"
            {}
            WHERE b.centre_id = $1
              AND b.is_active
              AND NOT EXISTS (
                  SELECT 1 FROM catalogue ct
                  WHERE ct.book_id = b.id AND ct.centre_id = $1 AND ct.is_active
              )
            ORDER BY b.title
            "#,
            SHORT_SELECT
        ))
        .bind(centre_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Books with these ids, in the given order
    pub async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE id = ANY($1) ORDER BY array_position($1, id)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }
}
