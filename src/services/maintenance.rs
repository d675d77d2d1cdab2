//! Periodic sweep: reservation expiry and overdue reminders

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{
    error::AppResult,
    models::{
        notification::{messages, overdue_group_id, NewNotification},
        NotificationType,
    },
    repository::Repository,
};

use super::{notifications::NotificationsService, reservations::ReservationsService};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub expired_reservations: u64,
    pub overdue_reminders: usize,
}

#[derive(Clone)]
pub struct MaintenanceService {
    repository: Repository,
    reservations: ReservationsService,
    notifications: NotificationsService,
}

impl MaintenanceService {
    pub fn new(
        repository: Repository,
        reservations: ReservationsService,
        notifications: NotificationsService,
    ) -> Self {
        Self {
            repository,
            reservations,
            notifications,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<MaintenanceReport> {
        let expired_reservations = self.reservations.expire(now).await?;

        let today = now.date_naive();
        let mut overdue_reminders = 0;
        for borrow in self
            .repository
            .borrows
            .claim_overdue_reminders(now, today)
            .await?
        {
            let Some(due) = borrow.due_date else {
                continue;
            };
            self.notifications
                .send(
                    NewNotification::new(
                        borrow.user_id,
                        NotificationType::OverdueReminder,
                        messages::overdue(&borrow.book_title, due),
                    )
                    .book(borrow.book_id)
                    .borrow(borrow.id)
                    .group(overdue_group_id(borrow.id, today)),
                )
                .await;
            overdue_reminders += 1;
        }

        if overdue_reminders > 0 {
            tracing::info!(overdue_reminders, "Overdue reminders sent");
        }
        Ok(MaintenanceReport {
            expired_reservations,
            overdue_reminders,
        })
    }

    /// Runs the sweep every `interval` until the runtime shuts down.
    /// A failed sweep is logged and retried on the next tick.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.run_once(Utc::now()).await {
                    Ok(report) => tracing::debug!(?report, "Maintenance sweep done"),
                    Err(e) => tracing::error!("Maintenance sweep failed: {}", e),
                }
            }
        })
    }
}
