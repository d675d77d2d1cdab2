//! In-app notifications, optionally mailed

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        notification::{messages, NewNotification, Notification},
        Book, NotificationType, Page, Reservation,
    },
    repository::{notifications::NotificationsRepository, Repository},
};

use super::email::{deliver_email, Mailer};

/// Number of notifications returned by `recent` when no limit is given
pub const RECENT_DEFAULT: i64 = 5;

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
    mailer: Arc<dyn Mailer>,
    email_enabled: bool,
}

impl NotificationsService {
    pub fn new(repository: Repository, mailer: Arc<dyn Mailer>, email_enabled: bool) -> Self {
        Self {
            repository,
            mailer,
            email_enabled,
        }
    }

    /// Stores a notification and mails it when its type is mailed.
    /// Delivery problems are logged; the calling operation has already
    /// succeeded and is not undone.
    pub async fn send(&self, notification: NewNotification) {
        if let Err(e) = self.try_send(&notification).await {
            tracing::error!(
                user_id = notification.user_id,
                kind = %notification.notification_type,
                "Failed to store notification: {}",
                e
            );
        }
    }

    async fn try_send(&self, notification: &NewNotification) -> AppResult<()> {
        let stored = NotificationsRepository::insert(&self.repository.pool, notification).await?;
        tracing::debug!(user_id = stored.user_id, id = stored.id, "Notification stored");

        if self.email_enabled && notification.notification_type.is_mailed() {
            let user = self.repository.users.get_by_id(notification.user_id).await?;
            deliver_email(&self.mailer, self.email_enabled, &user.email, notification).await;
        }
        Ok(())
    }

    pub async fn send_all(&self, notifications: Vec<NewNotification>) {
        for notification in notifications {
            self.send(notification).await;
        }
    }

    /// Sends `template` to every active librarian of the centre
    pub async fn notify_librarians(&self, centre_id: Option<i32>, template: NewNotification) {
        let librarians = match self.repository.users.librarians_of_centre(centre_id).await {
            Ok(librarians) => librarians,
            Err(e) => {
                tracing::error!(?centre_id, "Failed to look up librarians: {}", e);
                return;
            }
        };
        if librarians.is_empty() {
            tracing::debug!(?centre_id, "No librarian to notify");
        }
        self.send_all(
            librarians
                .iter()
                .map(|librarian| template.for_user(librarian.id))
                .collect(),
        )
        .await;
    }

    pub async fn list(
        &self,
        user_id: i32,
        unread_only: bool,
        page: Page,
    ) -> AppResult<(Vec<Notification>, i64)> {
        self.repository.notifications.list(user_id, unread_only, page).await
    }

    pub async fn recent(&self, user_id: i32, limit: Option<i64>) -> AppResult<Vec<Notification>> {
        let page = Page::new(Some(1), limit, RECENT_DEFAULT);
        let (notifications, _) = self.repository.notifications.list(user_id, false, page).await?;
        Ok(notifications)
    }

    pub async fn mark_read(&self, id: i32, user_id: i32) -> AppResult<Notification> {
        self.repository.notifications.mark_read(id, user_id).await
    }

    pub async fn delete(&self, id: i32, user_id: i32) -> AppResult<()> {
        self.repository.notifications.delete(id, user_id).await
    }

    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        self.repository.notifications.mark_all_read(user_id).await
    }

    pub async fn clear_all(&self, user_id: i32) -> AppResult<u64> {
        self.repository.notifications.clear_all(user_id).await
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        self.repository.notifications.unread_count(user_id).await
    }

    /// A copy came back: the reservation holder is told to request it
    /// within `hold_days`, the centre's librarians that it is set aside.
    pub async fn announce_available(&self, book: &Book, reservation: &Reservation, hold_days: i64) {
        tracing::info!(
            reservation_id = reservation.id,
            user_id = reservation.user_id,
            book_id = book.id,
            "Reservation holder notified"
        );
        self.send(
            NewNotification::new(
                reservation.user_id,
                NotificationType::BookAvailable,
                messages::book_available(&book.title, hold_days),
            )
            .book(book.id)
            .reservation(reservation.id),
        )
        .await;

        let holder = match self.repository.users.get_by_id(reservation.user_id).await {
            Ok(holder) => holder,
            Err(e) => {
                tracing::error!(user_id = reservation.user_id, "Failed to look up holder: {}", e);
                return;
            }
        };
        self.notify_librarians(
            reservation.centre_id,
            NewNotification::new(
                0,
                NotificationType::ReservationFulfilled,
                messages::reservation_ready(&book.title, &holder.full_name()),
            )
            .book(book.id)
            .reservation(reservation.id),
        )
        .await;
    }
}
