//! Notification model and message builders

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BorrowRequest,
    BorrowApproved,
    BorrowRejected,
    BookIssued,
    BookReturned,
    BookAvailable,
    ReservationFulfilled,
    TeacherBulkRequest,
    OverdueReminder,
    BorrowRenewed,
    General,
}

text_enum!(NotificationType {
    BorrowRequest => "borrow_request",
    BorrowApproved => "borrow_approved",
    BorrowRejected => "borrow_rejected",
    BookIssued => "book_issued",
    BookReturned => "book_returned",
    BookAvailable => "book_available",
    ReservationFulfilled => "reservation_fulfilled",
    TeacherBulkRequest => "teacher_bulk_request",
    OverdueReminder => "overdue_reminder",
    BorrowRenewed => "borrow_renewed",
    General => "general",
});

impl NotificationType {
    /// Types that are also sent by email when email is enabled
    pub fn is_mailed(&self) -> bool {
        matches!(
            self,
            NotificationType::BookAvailable | NotificationType::OverdueReminder
        )
    }

    pub fn subject(&self) -> &'static str {
        match self {
            NotificationType::BookAvailable => "A reserved book is available",
            NotificationType::OverdueReminder => "Overdue library book",
            _ => "Library notification",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub book_id: Option<i32>,
    pub borrow_id: Option<i32>,
    pub reservation_id: Option<i32>,
    pub group_id: Option<String>,
}

/// Notification to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: i32,
    pub notification_type: NotificationType,
    pub message: String,
    pub book_id: Option<i32>,
    pub borrow_id: Option<i32>,
    pub reservation_id: Option<i32>,
    pub group_id: Option<String>,
}

impl NewNotification {
    pub fn new(user_id: i32, notification_type: NotificationType, message: String) -> Self {
        Self {
            user_id,
            notification_type,
            message,
            book_id: None,
            borrow_id: None,
            reservation_id: None,
            group_id: None,
        }
    }

    pub fn book(mut self, book_id: i32) -> Self {
        self.book_id = Some(book_id);
        self
    }

    pub fn borrow(mut self, borrow_id: i32) -> Self {
        self.borrow_id = Some(borrow_id);
        self
    }

    pub fn reservation(mut self, reservation_id: i32) -> Self {
        self.reservation_id = Some(reservation_id);
        self
    }

    pub fn group(mut self, group_id: String) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Same notification for another recipient
    pub fn for_user(&self, user_id: i32) -> Self {
        Self {
            user_id,
            ..self.clone()
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: i64,
}

/// Messages shown to users. Dates are rendered as `YYYY-MM-DD`.
pub mod messages {
    use chrono::{DateTime, Utc};

    fn day(date: DateTime<Utc>) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    pub fn borrow_requested(borrower: &str, title: &str) -> String {
        format!("{} requested to borrow '{}'", borrower, title)
    }

    pub fn reserved(borrower: &str, title: &str) -> String {
        format!("{} reserved '{}'", borrower, title)
    }

    pub fn issued(title: &str, due: DateTime<Utc>) -> String {
        format!(
            "Your request for '{}' has been approved! Due date: {}",
            title,
            day(due)
        )
    }

    pub fn rejected(title: &str, reason: &str) -> String {
        format!("Your request for '{}' was rejected. Reason: {}", title, reason)
    }

    pub fn returned(title: &str) -> String {
        format!("Thank you for returning '{}'!", title)
    }

    pub fn renewed(title: &str, due: DateTime<Utc>) -> String {
        format!("'{}' renewed. New due date: {}", title, day(due))
    }

    pub fn book_available(title: &str, hold_days: i64) -> String {
        format!(
            "'{}' is now available! Your reservation is ready. Please request to borrow within {} days.",
            title, hold_days
        )
    }

    pub fn reservation_ready(title: &str, holder: &str) -> String {
        format!("'{}' is available for {}'s reservation", title, holder)
    }

    pub fn overdue(title: &str, due: DateTime<Utc>) -> String {
        format!(
            "'{}' was due on {}. Please return it to the library.",
            title,
            day(due)
        )
    }

    /// "X requested N books: 'a', 'b', 'c', and K more"
    pub fn teacher_bulk_request(teacher: &str, titles: &[String]) -> String {
        let mut listed = titles
            .iter()
            .take(3)
            .map(|t| format!("'{}'", t))
            .collect::<Vec<_>>()
            .join(", ");
        if titles.len() > 3 {
            listed.push_str(&format!(", and {} more", titles.len() - 3));
        }
        format!(
            "{} requested {} book{}: {}",
            teacher,
            titles.len(),
            if titles.len() == 1 { "" } else { "s" },
            listed
        )
    }
}

/// Groups one teacher's bulk requests of one day
pub fn teacher_bulk_group_id(teacher_id: i32, date: NaiveDate) -> String {
    hex::encode(Sha256::digest(format!("{}-{}", teacher_id, date).as_bytes()))
}

/// One overdue reminder per borrow and day
pub fn overdue_group_id(borrow_id: i32, date: NaiveDate) -> String {
    format!("overdue-{}-{}", borrow_id, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bulk_message_lists_three_titles() {
        let titles: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            messages::teacher_bulk_request("Mr. Kamau", &titles),
            "Mr. Kamau requested 5 books: 'a', 'b', 'c', and 2 more"
        );
        assert_eq!(
            messages::teacher_bulk_request("Mr. Kamau", &titles[..1]),
            "Mr. Kamau requested 1 book: 'a'"
        );
    }

    #[test]
    fn dated_messages() {
        let due = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
        assert_eq!(
            messages::issued("Atlas", due),
            "Your request for 'Atlas' has been approved! Due date: 2025-03-04"
        );
        assert!(messages::book_available("Atlas", 2).contains("within 2 days"));
    }

    #[test]
    fn group_ids_are_stable() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let a = teacher_bulk_group_id(4, date);
        assert_eq!(a.len(), 64);
        assert_eq!(a, teacher_bulk_group_id(4, date));
        assert_ne!(a, teacher_bulk_group_id(5, date));
        assert_eq!(overdue_group_id(12, date), "overdue-12-2025-01-31");
    }

    #[test]
    fn builder_sets_links() {
        let n = NewNotification::new(1, NotificationType::BookIssued, "m".into())
            .book(2)
            .borrow(3);
        assert_eq!(n.book_id, Some(2));
        assert_eq!(n.borrow_id, Some(3));
        assert_eq!(n.for_user(9).user_id, 9);
        assert!(NotificationType::OverdueReminder.is_mailed());
        assert!(!NotificationType::BookIssued.is_mailed());
    }
}
