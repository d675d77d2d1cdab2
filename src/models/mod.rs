//! Data models for LibraryHub

/// Implements `as_str`, `Display`, `FromStr` and the sqlx TEXT mapping for a
/// fieldless enum stored as a lowercase string.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("Invalid {}: {}", stringify!($name), other)),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

pub mod book;
pub mod borrow;
pub mod catalogue;
pub mod dashboard;
pub mod notification;
pub mod organisation;
pub mod reservation;
pub mod student;
pub mod teacher_issue;
pub mod user;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use borrow::{Borrow, BorrowDetails, BorrowStatus};
pub use catalogue::CatalogueEntry;
pub use notification::{Notification, NotificationType};
pub use organisation::{Category, Centre, Grade, School, Subject};
pub use reservation::{Reservation, ReservationStatus};
pub use student::Student;
pub use teacher_issue::{TeacherBookIssue, TeacherIssueStatus};
pub use user::{Role, User, UserClaims};

/// Which borrower population a staff listing targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Students,
    Teachers,
}

impl UserType {
    pub fn role(&self) -> Role {
        match self {
            UserType::Students => Role::Student,
            UserType::Teachers => Role::Teacher,
        }
    }
}

/// Page/per-page pair normalised for SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub const MAX_PER_PAGE: i64 = 200;
    /// Highest page whose offset still fits in an `i64`
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_PER_PAGE;

    pub fn new(page: Option<i64>, per_page: Option<i64>, default_per_page: i64) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, Self::MAX_PAGE),
            per_page: per_page
                .unwrap_or(default_per_page)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// Count of rows grouped by user, used by the grouped staff listings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct UserWithCount {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub centre_id: Option<i32>,
    pub count: i64,
}

/// One failed row or id of a bulk operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BulkFailure {
    /// Row number (imports) or record id (bulk actions)
    pub reference: String,
    pub reason: String,
}

impl BulkFailure {
    pub fn new(reference: impl ToString, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a bulk operation
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkReport {
    pub processed: usize,
    pub failed: Vec<BulkFailure>,
    #[serde(default)]
    pub message: String,
}

impl BulkReport {
    pub fn fail(&mut self, reference: impl ToString, reason: impl Into<String>) {
        self.failed.push(BulkFailure::new(reference, reason));
    }

    /// Fills in the summary message
    pub fn finish(mut self, verb: &str) -> Self {
        self.message = match (self.processed, self.failed.len()) {
            (0, 0) => format!("Nothing was {}", verb),
            (n, 0) => format!("{} {}", n, verb),
            (n, f) => format!("{} {}, {} failed", n, verb, f),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        let page = Page::new(Some(0), Some(10_000), 20);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, Page::MAX_PER_PAGE);
        assert_eq!(page.offset(), 0);

        let page = Page::new(Some(3), None, 20);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = Page::new(Some(i64::MAX), Some(20), 20);
        assert_eq!(page.page, Page::MAX_PAGE);
        assert!(page.offset() > 0);

        let page = Page::new(Some(i64::MAX), Some(Page::MAX_PER_PAGE), 20);
        assert_eq!(page.offset(), (Page::MAX_PAGE - 1) * Page::MAX_PER_PAGE);

        let page = Page { page: i64::MAX, per_page: Page::MAX_PER_PAGE };
        assert_eq!(page.offset(), i64::MAX);
    }

    #[test]
    fn bulk_report_message() {
        let report = BulkReport::default().finish("issued");
        assert_eq!(report.message, "Nothing was issued");

        let mut report = BulkReport {
            processed: 2,
            ..Default::default()
        };
        report.fail(7, "Unavailable");
        let report = report.finish("issued");
        assert_eq!(report.message, "2 issued, 1 failed");
        assert_eq!(report.failed[0].reference, "7");
    }
}
