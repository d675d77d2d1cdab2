//! Aggregate counts for the staff dashboard

use sqlx::{Pool, Postgres, Row};

use crate::{error::AppResult, models::dashboard::StaffTotals};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: Pool<Postgres>,
}

impl DashboardRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Totals for one centre, or for all of them when `centre_id` is `None`
    pub async fn staff_totals(&self, centre_id: Option<i32>) -> AppResult<StaffTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM books WHERE ($1::int IS NULL OR centre_id = $1)) AS books,
                (SELECT COUNT(*) FROM centres WHERE ($1::int IS NULL OR id = $1)) AS centres,
                (SELECT COUNT(*) FROM users WHERE ($1::int IS NULL OR centre_id = $1)) AS users,
                (SELECT COUNT(*) FROM students WHERE ($1::int IS NULL OR centre_id = $1)) AS students,
                (SELECT COUNT(*) FROM borrows
                    WHERE status = 'issued' AND ($1::int IS NULL OR centre_id = $1)) AS active_borrows,
                (SELECT COUNT(*) FROM borrows
                    WHERE status = 'requested' AND ($1::int IS NULL OR centre_id = $1)) AS pending_requests,
                (SELECT COUNT(*) FROM reservations
                    WHERE status = 'pending' AND ($1::int IS NULL OR centre_id = $1)) AS pending_reservations,
                (SELECT COUNT(*) FROM borrows
                    WHERE status = 'issued' AND due_date < NOW()
                      AND ($1::int IS NULL OR centre_id = $1)) AS overdue_borrows
            "#,
        )
        .bind(centre_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(StaffTotals {
            books: row.get("books"),
            centres: row.get("centres"),
            users: row.get("users"),
            students: row.get("students"),
            active_borrows: row.get("active_borrows"),
            pending_requests: row.get("pending_requests"),
            pending_reservations: row.get("pending_reservations"),
            overdue_borrows: row.get("overdue_borrows"),
        })
    }
}
