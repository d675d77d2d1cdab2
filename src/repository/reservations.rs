//! Reservations repository

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{Reservation, ReservationDetails, ReservationStatus},
        user::Role,
        Page,
    },
};

use super::like_pattern;

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.book_id, bk.title AS book_title, bk.author AS book_author,
           bk.available_copies, r.user_id, u.email AS user_email,
           u.first_name AS user_first_name, u.last_name AS user_last_name,
           u.role AS user_role, r.centre_id, r.reservation_date, r.expiry_date,
           r.status, r.notified
    FROM reservations r
    JOIN books bk ON bk.id = r.book_id
    JOIN users u ON u.id = r.user_id
"#;

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    pub async fn has_pending(&self, user_id: i32, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reservations WHERE user_id = $1 AND book_id = $2 AND status = 'pending')",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(
        &self,
        book_id: i32,
        user_id: i32,
        centre_id: Option<i32>,
        now: DateTime<Utc>,
        expiry_date: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (book_id, user_id, centre_id, reservation_date, expiry_date, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(centre_id)
        .bind(now)
        .bind(expiry_date)
        .bind(ReservationStatus::Pending)
        .fetch_one(&self.pool)
        .await?;
        Ok(reservation)
    }

    /// Move a pending reservation to `status`. Returns `None` when it was no
    /// longer pending.
    pub async fn close(&self, id: i32, status: ReservationStatus) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            "UPDATE reservations SET status = $2 WHERE id = $1 AND status = 'pending' RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reservation)
    }

    /// Marks the user's pending reservation of a book as fulfilled
    pub async fn fulfil(&self, user_id: i32, book_id: i32) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations SET status = 'fulfilled'
            WHERE user_id = $1 AND book_id = $2 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reservation)
    }

    /// Flags the oldest pending, not yet notified reservation of a book
    pub async fn notify_next(
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
    ) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations SET notified = TRUE
            WHERE id = (
                SELECT id FROM reservations
                WHERE book_id = $1 AND status = 'pending' AND NOT notified
                ORDER BY reservation_date, id
                LIMIT 1
                FOR UPDATE
            )
            RETURNING *
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(reservation)
    }

    /// Pending reservations of a user
    pub async fn pending_for_user(&self, user_id: i32) -> AppResult<Vec<ReservationDetails>> {
        let reservations = sqlx::query_as::<_, ReservationDetails>(&format!(
            "{} WHERE r.user_id = $1 AND r.status = 'pending' ORDER BY r.reservation_date",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    /// Every reservation of a user, newest first
    pub async fn for_user(&self, user_id: i32, centre_id: Option<i32>) -> AppResult<Vec<ReservationDetails>> {
        let reservations = sqlx::query_as::<_, ReservationDetails>(&format!(
            r#"
            {}
            WHERE r.user_id = $1 AND ($2::int IS NULL OR r.centre_id = $2)
            ORDER BY r.reservation_date DESC, r.id DESC
            "#,
            DETAILS_SELECT
        ))
        .bind(user_id)
        .bind(centre_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    /// Pending reservations of a role for staff, oldest first
    pub async fn search_pending(
        &self,
        role: Role,
        search: Option<&str>,
        centre_id: Option<i32>,
        page: Page,
    ) -> AppResult<(Vec<ReservationDetails>, i64)> {
        let pattern = like_pattern(search);
        let filter = r#"
            WHERE r.status = 'pending'
              AND u.role = $2
              AND ($3::int IS NULL OR r.centre_id = $3)
              AND ($1::text IS NULL
                   OR LOWER(bk.title) LIKE $1
                   OR LOWER(u.email) LIKE $1
                   OR LOWER(u.first_name) LIKE $1
                   OR LOWER(u.last_name) LIKE $1)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*) FROM reservations r
            JOIN books bk ON bk.id = r.book_id
            JOIN users u ON u.id = r.user_id
            {}
            "#,
            filter
        ))
        .bind(&pattern)
        .bind(role)
        .bind(centre_id)
        .fetch_one(&self.pool)
        .await?;

        let reservations = sqlx::query_as::<_, ReservationDetails>(&format!(
            "{} {} ORDER BY r.reservation_date, r.id LIMIT $4 OFFSET $5",
            DETAILS_SELECT, filter
        ))
        .bind(&pattern)
        .bind(role)
        .bind(centre_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((reservations, total))
    }

    /// Moves pending reservations past their expiry to `expired`
    pub async fn expire(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE reservations SET status = 'expired' WHERE status = 'pending' AND expiry_date < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
