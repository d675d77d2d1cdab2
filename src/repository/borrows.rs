//! Borrows repository: requests, issue/return transactions and staff listings

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        book::Book,
        borrow::{borrow_limit_reached, can_borrow, Borrow, BorrowDetails, BorrowStatus},
        reservation::Reservation,
        user::Role,
        Page, UserWithCount,
    },
};

use super::{books::BooksRepository, like_pattern, reservations::ReservationsRepository};

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.book_id, bk.title AS book_title, bk.author AS book_author, bk.book_code,
           b.user_id, u.email AS user_email, u.first_name AS user_first_name,
           u.last_name AS user_last_name, u.role AS user_role, b.centre_id, b.status,
           b.request_date, b.issue_date, b.due_date, b.return_date, b.renewals, b.notes,
           (b.status = 'issued' AND b.due_date IS NOT NULL AND b.due_date < NOW()) AS is_overdue
    FROM borrows b
    JOIN books bk ON bk.id = b.book_id
    JOIN users u ON u.id = b.user_id
"#;

/// Borrower name/email or book title search on the details join
const DETAILS_SEARCH: &str = r#"
    ($1::text IS NULL
     OR LOWER(u.email) LIKE $1
     OR LOWER(u.first_name) LIKE $1
     OR LOWER(u.last_name) LIKE $1
     OR LOWER(bk.title) LIKE $1)
"#;

/// Result of a return: the borrow, the book after the copy came back and the
/// reservation whose holder must now be told.
#[derive(Debug)]
pub struct ReturnOutcome {
    pub borrow: Borrow,
    pub book: Book,
    pub notified_reservation: Option<Reservation>,
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get borrow by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    pub async fn get_details(&self, id: i32) -> AppResult<BorrowDetails> {
        sqlx::query_as::<_, BorrowDetails>(&format!("{} WHERE b.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// Requested plus issued borrows of a user
    pub async fn count_active(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND status IN ('requested', 'issued')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count_overdue(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND status = 'issued' AND due_date < NOW()",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn has_active_for_book(&self, user_id: i32, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrows
                WHERE user_id = $1 AND book_id = $2 AND status IN ('requested', 'issued')
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a `requested` borrow. The user row is locked while active
    /// borrows are counted against `limit`, so concurrent requests of one
    /// user are checked one after the other.
    pub async fn create_request(
        &self,
        book_id: i32,
        user_id: i32,
        centre_id: Option<i32>,
        notes: &str,
        limit: Option<i64>,
    ) -> AppResult<Borrow> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NoSuchUser(user_id))?;

        if let Some(limit) = limit {
            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND status IN ('requested', 'issued')",
            )
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
            if !can_borrow(Some(limit), active) {
                return Err(borrow_limit_reached(limit));
            }
        }

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (book_id, user_id, centre_id, status, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(centre_id)
        .bind(BorrowStatus::Requested)
        .bind(notes.trim())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(borrow)
    }

    /// Deletes a borrow that is still `requested`. Returns `false` when it
    /// was processed in the meantime.
    pub async fn delete_requested(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM borrows WHERE id = $1 AND status = 'requested'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Issue a requested borrow. The borrow and its book are locked; the
    /// status, the due date and the available copies are updated together.
    pub async fn issue(
        &self,
        id: i32,
        issued_by: i32,
        now: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<(Borrow, Book)> {
        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))?;

        borrow
            .status
            .expect(BorrowStatus::Requested, "This request has already been processed")?;

        let book = BooksRepository::lock(&mut tx, borrow.book_id).await?;
        if !book.is_available() {
            return Err(AppError::rule(
                ErrorCode::BookNotAvailable,
                format!("'{}' has no available copies", book.title),
            ));
        }

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows
            SET status = $2, issue_date = $3, due_date = $4, issued_by = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(BorrowStatus::Issued)
        .bind(now)
        .bind(due_date)
        .bind(issued_by)
        .fetch_one(&mut *tx)
        .await?;

        let book = sqlx::query_as::<_, Book>(
            "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 RETURNING *",
        )
        .bind(book.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((borrow, book))
    }

    /// Receive an issued borrow back. The copy count is incremented without
    /// exceeding the total, and the oldest waiting reservation is flagged.
    pub async fn receive_return(
        &self,
        id: i32,
        returned_to: i32,
        now: DateTime<Utc>,
    ) -> AppResult<ReturnOutcome> {
        let mut tx = self.pool.begin().await?;

        let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM borrows WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))?;

        borrow
            .status
            .expect(BorrowStatus::Issued, "Only issued books can be returned")?;

        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows SET status = $2, return_date = $3, returned_to = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(BorrowStatus::Returned)
        .bind(now)
        .bind(returned_to)
        .fetch_one(&mut *tx)
        .await?;

        let (book, notified_reservation) = Self::restock(&mut tx, borrow.book_id).await?;

        tx.commit().await?;
        Ok(ReturnOutcome {
            borrow,
            book,
            notified_reservation,
        })
    }

    /// Puts one copy of a book back on the shelf, never above its total,
    /// and flags the oldest waiting reservation.
    pub async fn restock(
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
    ) -> AppResult<(Book, Option<Reservation>)> {
        BooksRepository::lock(tx, book_id).await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET available_copies = LEAST(total_copies, available_copies + 1)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book_id)
        .fetch_one(&mut **tx)
        .await?;

        let notified = ReservationsRepository::notify_next(tx, book_id).await?;
        Ok((book, notified))
    }

    /// Add a renewal. The status and count are checked in the same statement
    /// so two concurrent renewals cannot exceed the maximum.
    pub async fn renew(&self, id: i32, max_renewals: i32, new_due: DateTime<Utc>) -> AppResult<Option<Borrow>> {
        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            UPDATE borrows SET renewals = renewals + 1, due_date = $3
            WHERE id = $1 AND status = 'issued' AND renewals < $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(max_renewals)
        .bind(new_due)
        .fetch_optional(&self.pool)
        .await?;
        Ok(borrow)
    }

    /// Borrows of a user in the given statuses, newest request first
    pub async fn for_user(
        &self,
        user_id: i32,
        statuses: &[BorrowStatus],
        limit: Option<i64>,
    ) -> AppResult<Vec<BorrowDetails>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let borrows = sqlx::query_as::<_, BorrowDetails>(&format!(
            r#"
            {}
            WHERE b.user_id = $1 AND b.status = ANY($2)
            ORDER BY COALESCE(b.return_date, b.request_date) DESC, b.id DESC
            LIMIT $3
            "#,
            DETAILS_SELECT
        ))
        .bind(user_id)
        .bind(&statuses)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(borrows)
    }

    /// Issued borrows of a teacher, for sub-lending
    pub async fn issued_to(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        let borrows = sqlx::query_as::<_, BorrowDetails>(&format!(
            "{} WHERE b.user_id = $1 AND b.status = 'issued' ORDER BY b.issue_date DESC, b.id DESC",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(borrows)
    }

    /// Requested borrows of one user within a centre filter
    pub async fn requested_for_user(
        &self,
        user_id: i32,
        centre_id: Option<i32>,
    ) -> AppResult<Vec<BorrowDetails>> {
        let borrows = sqlx::query_as::<_, BorrowDetails>(&format!(
            r#"
            {}
            WHERE b.user_id = $1 AND b.status = 'requested'
              AND ($2::int IS NULL OR b.centre_id = $2)
            ORDER BY b.request_date
            "#,
            DETAILS_SELECT
        ))
        .bind(user_id)
        .bind(centre_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(borrows)
    }

    /// Users with requested borrows and how many, largest first
    pub async fn pending_users(
        &self,
        search: Option<&str>,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<UserWithCount>, i64)> {
        self.grouped_users("b.status = 'requested'", search, None, centre_id, page)
            .await
    }

    /// Users of a role with issued borrows and how many
    pub async fn active_users(
        &self,
        role: Role,
        search: Option<&str>,
        overdue_only: bool,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<UserWithCount>, i64)> {
        let condition = if overdue_only {
            "b.status = 'issued' AND b.due_date < NOW()"
        } else {
            "b.status = 'issued'"
        };
        self.grouped_users(condition, search, Some(role), centre_id, page)
            .await
    }

    async fn grouped_users(
        &self,
        condition: &str,
        search: Option<&str>,
        role: Option<Role>,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<UserWithCount>, i64)> {
        let pattern = like_pattern(search);
        let filter = format!(
            r#"
            FROM borrows b
            JOIN users u ON u.id = b.user_id
            JOIN books bk ON bk.id = b.book_id
            WHERE {} AND {}
              AND ($2::text IS NULL OR u.role = $2)
              AND ($3::int IS NULL OR b.centre_id = $3)
            "#,
            condition, DETAILS_SEARCH
        );

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(DISTINCT u.id) {}", filter))
            .bind(&pattern)
            .bind(role)
            .bind(centre_id)
            .fetch_one(&self.pool)
            .await?;

        let users = sqlx::query_as::<_, UserWithCount>(&format!(
            r#"
            SELECT u.id, u.email, u.first_name, u.last_name, u.centre_id, COUNT(b.id) AS count
            {}
            GROUP BY u.id
            ORDER BY count DESC, u.last_name, u.first_name
            LIMIT $4 OFFSET $5
            "#,
            filter
        ))
        .bind(&pattern)
        .bind(role)
        .bind(centre_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total))
    }

    /// Issued borrows of a role, soonest due first
    pub async fn active_list(
        &self,
        role: Role,
        search: Option<&str>,
        overdue_only: bool,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let overdue = if overdue_only { "AND b.due_date < NOW()" } else { "" };
        self.details_page(
            &format!("b.status = 'issued' {}", overdue),
            "b.due_date, b.id",
            search,
            Some(role),
            centre_id,
            page,
        )
        .await
    }

    /// Borrow history of a role, newest first
    pub async fn history(
        &self,
        role: Role,
        search: Option<&str>,
        status: Option<BorrowStatus>,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let condition = match status {
            Some(status) => format!("b.status = '{}'", status.as_str()),
            None => "TRUE".to_string(),
        };
        self.details_page(
            &condition,
            "b.request_date DESC, b.id DESC",
            search,
            Some(role),
            centre_id,
            page,
        )
        .await
    }

    async fn details_page(
        &self,
        condition: &str,
        order: &str,
        search: Option<&str>,
        role: Option<Role>,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let pattern = like_pattern(search);
        let filter = format!(
            r#"
            WHERE {} AND {}
              AND ($2::text IS NULL OR u.role = $2)
              AND ($3::int IS NULL OR b.centre_id = $3)
            "#,
            condition, DETAILS_SEARCH
        );

        let total: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*) FROM borrows b
            JOIN books bk ON bk.id = b.book_id
            JOIN users u ON u.id = b.user_id
            {}
            "#,
            filter
        ))
        .bind(&pattern)
        .bind(role)
        .bind(centre_id)
        .fetch_one(&self.pool)
        .await?;

        let borrows = sqlx::query_as::<_, BorrowDetails>(&format!(
            "{} {} ORDER BY {} LIMIT $4 OFFSET $5",
            DETAILS_SELECT, filter, order
        ))
        .bind(&pattern)
        .bind(role)
        .bind(centre_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((borrows, total))
    }

    /// Issued borrows past their due date that have not been reminded on
    /// `today`. They are marked as reminded in the same statement, so each
    /// borrow is returned at most once per day.
    pub async fn claim_overdue_reminders(
        &self,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> AppResult<Vec<BorrowDetails>> {
        let borrows = sqlx::query_as::<_, BorrowDetails>(&format!(
            r#"
            WITH claimed AS (
                UPDATE borrows SET last_overdue_reminder = $2
                WHERE status = 'issued' AND due_date < $1
                  AND (last_overdue_reminder IS NULL OR last_overdue_reminder < $2)
                RETURNING id
            )
            {} WHERE b.id IN (SELECT id FROM claimed) ORDER BY b.due_date
            "#,
            DETAILS_SELECT
        ))
        .bind(now)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(borrows)
    }
}
