//! Dashboard payloads, one per role family

use serde::Serialize;
use utoipa::ToSchema;

use super::Role;

/// Totals for admins (all centres) and librarians (own centre)
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct StaffTotals {
    pub books: i64,
    pub centres: i64,
    pub users: i64,
    pub students: i64,
    pub active_borrows: i64,
    pub pending_requests: i64,
    pub pending_reservations: i64,
    pub overdue_borrows: i64,
}

#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct BorrowerSummary {
    pub active_borrows: i64,
    pub overdue: i64,
    pub unread_notifications: i64,
    pub borrow_limit: Option<i64>,
    pub can_borrow_more: bool,
    /// Teachers only
    pub active_sub_loans: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dashboard {
    Staff {
        role: Role,
        centre_id: Option<i32>,
        totals: StaffTotals,
    },
    Borrower {
        role: Role,
        summary: BorrowerSummary,
    },
}
