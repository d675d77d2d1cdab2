//! Users repository for database operations

use sqlx::{PgExecutor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{Role, UpdateProfile, UpdateUser, User, UserQuery, UserShort},
        Book, Page, Reservation,
    },
};

use super::{borrows::BorrowsRepository, like_pattern};

/// User row to insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub centre_id: Option<i32>,
    pub force_password_change: bool,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NoSuchUser(id))
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Account linked to the student with this child ID
    pub async fn get_by_child_id(&self, child_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN students s ON s.user_id = u.id
            WHERE s.child_id = $1
            "#,
        )
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::int IS NULL OR id != $2))",
        )
        .bind(email.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn admin_exists(&self) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Active librarians of a centre, the recipients of circulation notices
    pub async fn librarians_of_centre(&self, centre_id: Option<i32>) -> AppResult<Vec<User>> {
        let Some(centre_id) = centre_id else {
            return Ok(Vec::new());
        };
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE role = 'librarian' AND centre_id = $1 AND is_active ORDER BY id",
        )
        .bind(centre_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery, page: Page) -> AppResult<(Vec<UserShort>, i64)> {
        let pattern = like_pattern(query.search.as_deref());
        let filter = r#"
            WHERE ($1::text IS NULL
                   OR LOWER(email) LIKE $1
                   OR LOWER(first_name) LIKE $1
                   OR LOWER(last_name) LIKE $1)
              AND ($2::text IS NULL OR role = $2)
              AND ($3::int IS NULL OR centre_id = $3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {}", filter))
            .bind(&pattern)
            .bind(query.role)
            .bind(query.centre_id)
            .fetch_one(&self.pool)
            .await?;

        let users = sqlx::query_as::<_, UserShort>(&format!(
            r#"
            SELECT id, email, first_name, last_name, role, centre_id
            FROM users {}
            ORDER BY last_name, first_name, email
            LIMIT $4 OFFSET $5
            "#,
            filter
        ))
        .bind(&pattern)
        .bind(query.role)
        .bind(query.centre_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total))
    }

    /// Create a new user
    pub async fn create(&self, user: &NewUser) -> AppResult<User> {
        Self::insert(&self.pool, user).await
    }

    /// Insert on any executor, so callers can create a user inside a transaction
    pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, user: &NewUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password, first_name, last_name, role, centre_id, force_password_change)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user.email.trim())
        .bind(&user.password_hash)
        .bind(user.first_name.trim())
        .bind(user.last_name.trim())
        .bind(user.role)
        .bind(user.centre_id)
        .bind(user.force_password_change)
        .fetch_one(executor)
        .await?;
        Ok(user)
    }

    /// Update an existing user. `password_hash` replaces the password when set.
    pub async fn update(
        &self,
        id: i32,
        update: &UpdateUser,
        password_hash: Option<String>,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                password = COALESCE($3, password),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                role = COALESCE($6, role),
                centre_id = CASE WHEN $8 THEN NULL ELSE COALESCE($7, centre_id) END,
                is_active = COALESCE($9, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.email.as_deref().map(str::trim))
        .bind(password_hash)
        .bind(update.first_name.as_deref().map(str::trim))
        .bind(update.last_name.as_deref().map(str::trim))
        .bind(update.role)
        .bind(update.centre_id)
        .bind(update.clear_centre)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NoSuchUser(id))
    }

    /// Update own profile. The centre is only written when `allow_centre` is set.
    pub async fn update_profile(
        &self,
        id: i32,
        profile: &UpdateProfile,
        allow_centre: bool,
    ) -> AppResult<User> {
        let centre_id = if allow_centre { profile.centre_id } else { None };
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                centre_id = COALESCE($5, centre_id)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(profile.first_name.as_deref().map(str::trim))
        .bind(profile.last_name.as_deref().map(str::trim))
        .bind(profile.email.as_deref().map(str::trim))
        .bind(centre_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NoSuchUser(id))
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password = $2, force_password_change = FALSE WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a user; borrows, reservations and notifications cascade.
    /// Copies the user still holds go back on the shelf in the same
    /// transaction. Returns each restocked book with the reservation now
    /// first in line for it.
    pub async fn delete(&self, id: i32) -> AppResult<Vec<(Book, Option<Reservation>)>> {
        let mut tx = self.pool.begin().await?;

        // The user's own reservations must not be picked as next in line
        sqlx::query("DELETE FROM reservations WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let held: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT book_id FROM borrows
            WHERE user_id = $1 AND status = 'issued'
            ORDER BY book_id
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let mut restocked = Vec::with_capacity(held.len());
        for book_id in held {
            restocked.push(BorrowsRepository::restock(&mut tx, book_id).await?);
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NoSuchUser(id));
        }

        tx.commit().await?;
        Ok(restocked)
    }
}
