//! Reservation model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::{Role, UserType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Fulfilled,
    Cancelled,
    Expired,
}

text_enum!(ReservationStatus {
    Pending => "pending",
    Fulfilled => "fulfilled",
    Cancelled => "cancelled",
    Expired => "expired",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub centre_id: Option<i32>,
    pub reservation_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: ReservationStatus,
    /// Set once the holder was told a copy came back
    pub notified: bool,
}

impl Reservation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expiry_date < now
    }
}

/// Reservation joined with its book and holder
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReservationDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_author: String,
    pub available_copies: i32,
    pub user_id: i32,
    pub user_email: String,
    pub user_first_name: String,
    pub user_last_name: String,
    pub user_role: Role,
    pub centre_id: Option<i32>,
    pub reservation_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub notified: bool,
}

pub fn expiry_from(now: DateTime<Utc>, expiry_days: i64) -> DateTime<Utc> {
    now + Duration::days(expiry_days)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReserveBook {
    pub book_id: i32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReservationQuery {
    #[serde(default)]
    pub user_type: UserType,
    /// Matches book title or holder name
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reservation_expires() {
        let now = Utc::now();
        let mut reservation = Reservation {
            id: 1,
            book_id: 2,
            user_id: 3,
            centre_id: None,
            reservation_date: now - Duration::days(8),
            expiry_date: expiry_from(now - Duration::days(8), 7),
            status: ReservationStatus::Pending,
            notified: false,
        };
        assert!(reservation.is_expired_at(now));

        reservation.status = ReservationStatus::Cancelled;
        assert!(!reservation.is_expired_at(now));
    }

    #[test]
    fn status_text() {
        assert_eq!(ReservationStatus::Fulfilled.as_str(), "fulfilled");
        assert_eq!("EXPIRED".parse::<ReservationStatus>(), Ok(ReservationStatus::Expired));
    }
}
