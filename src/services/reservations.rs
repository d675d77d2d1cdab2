//! Reservations: a place in line for a book with no copy on the shelf

use chrono::{DateTime, Utc};

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult, ErrorCode},
    models::{
        notification::{messages, NewNotification},
        reservation::{expiry_from, ReservationDetails, ReservationQuery},
        Book, NotificationType, Page, Reservation, ReservationStatus, User, UserClaims,
    },
    repository::Repository,
};

use super::{notifications::NotificationsService, scoped_user};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    rules: CirculationConfig,
    notifications: NotificationsService,
}

impl ReservationsService {
    pub fn new(
        repository: Repository,
        rules: CirculationConfig,
        notifications: NotificationsService,
    ) -> Self {
        Self {
            repository,
            rules,
            notifications,
        }
    }

    /// Creates a pending reservation and tells the centre's librarians
    pub(crate) async fn place(
        &self,
        user: &User,
        book: &Book,
        centre_id: Option<i32>,
    ) -> AppResult<Reservation> {
        if self.repository.reservations.has_pending(user.id, book.id).await? {
            return Err(AppError::Conflict(
                "You already have a pending reservation for this book".to_string(),
            ));
        }

        let now = Utc::now();
        let reservation = self
            .repository
            .reservations
            .create(
                book.id,
                user.id,
                centre_id,
                now,
                expiry_from(now, self.rules.reservation_expiry_days),
            )
            .await?;
        tracing::info!(
            reservation_id = reservation.id,
            book_id = book.id,
            user_id = user.id,
            "Reservation created"
        );

        self.notifications
            .notify_librarians(
                centre_id,
                NewNotification::new(
                    0,
                    NotificationType::BorrowRequest,
                    messages::reserved(&user.full_name(), &book.title),
                )
                .book(book.id)
                .reservation(reservation.id),
            )
            .await;

        Ok(reservation)
    }

    /// Active book of the caller's centre, or 404
    pub(crate) async fn visible_book(&self, claims: &UserClaims, book_id: i32) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(book_id).await?;
        if !book.is_active || !claims.scope().allows(book.centre_id) {
            return Err(AppError::NoSuchBook(book_id));
        }
        Ok(book)
    }

    pub async fn reserve_book(&self, claims: &UserClaims, book_id: i32) -> AppResult<Reservation> {
        claims.require_reserver()?;
        let book = self.visible_book(claims, book_id).await?;

        if book.is_available() {
            return Err(AppError::rule(
                ErrorCode::BadValue,
                format!(
                    "'{}' has available copies. Consider borrowing instead",
                    book.title
                ),
            ));
        }

        let user = self.repository.users.get_by_id(claims.user_id).await?;
        self.place(&user, &book, user.centre_id).await
    }

    /// Owner-only; the reservation must still be pending
    pub async fn cancel(&self, claims: &UserClaims, id: i32) -> AppResult<Reservation> {
        let reservation = self.repository.reservations.get_by_id(id).await?;
        if reservation.user_id != claims.user_id {
            return Err(AppError::NotFound(format!("Reservation with id {} not found", id)));
        }

        let not_pending = || {
            AppError::rule(
                ErrorCode::InvalidStatus,
                "Only pending reservations can be cancelled",
            )
        };
        if reservation.status != ReservationStatus::Pending {
            return Err(not_pending());
        }
        let cancelled = self
            .repository
            .reservations
            .close(id, ReservationStatus::Cancelled)
            .await?
            .ok_or_else(not_pending)?;

        tracing::info!(reservation_id = id, user_id = claims.user_id, "Reservation cancelled");
        Ok(cancelled)
    }

    /// Pending reservations of students or teachers within the caller's scope
    pub async fn list(
        &self,
        claims: &UserClaims,
        query: &ReservationQuery,
        page: Page,
    ) -> AppResult<(Vec<ReservationDetails>, i64)> {
        self.repository
            .reservations
            .search_pending(
                query.user_type.role(),
                query.search.as_deref(),
                claims.scope().filter(),
                page,
            )
            .await
    }

    pub async fn user_reservations(
        &self,
        claims: &UserClaims,
        user_id: i32,
    ) -> AppResult<Vec<ReservationDetails>> {
        scoped_user(&self.repository, claims, user_id).await?;
        self.repository
            .reservations
            .for_user(user_id, claims.scope().filter())
            .await
    }

    /// Moves pending reservations past their expiry date to `expired`
    pub async fn expire(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let expired = self.repository.reservations.expire(now).await?;
        if expired > 0 {
            tracing::info!(expired, "Reservations expired");
        }
        Ok(expired)
    }
}
