//! Role dependent dashboard

use crate::{
    config::CirculationConfig,
    error::AppResult,
    models::{
        borrow::can_borrow,
        dashboard::{BorrowerSummary, Dashboard},
        Role, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct DashboardService {
    repository: Repository,
    rules: CirculationConfig,
}

impl DashboardService {
    pub fn new(repository: Repository, rules: CirculationConfig) -> Self {
        Self { repository, rules }
    }

    /// Staff get centre totals, borrowers their own circulation summary
    pub async fn dashboard(&self, claims: &UserClaims) -> AppResult<Dashboard> {
        if claims.role.is_staff() {
            let totals = self
                .repository
                .dashboard
                .staff_totals(claims.scope().filter())
                .await?;
            return Ok(Dashboard::Staff {
                role: claims.role,
                centre_id: claims.centre_id,
                totals,
            });
        }

        Ok(Dashboard::Borrower {
            role: claims.role,
            summary: self.borrower_summary(claims).await?,
        })
    }

    async fn borrower_summary(&self, claims: &UserClaims) -> AppResult<BorrowerSummary> {
        let user_id = claims.user_id;
        let active_borrows = self.repository.borrows.count_active(user_id).await?;
        let borrow_limit = self.rules.borrow_limit(claims.role);

        let active_sub_loans = if claims.role == Role::Teacher {
            Some(self.repository.teacher_issues.count_active(user_id).await?)
        } else {
            None
        };

        Ok(BorrowerSummary {
            active_borrows,
            overdue: self.repository.borrows.count_overdue(user_id).await?,
            unread_notifications: self.repository.notifications.unread_count(user_id).await?,
            borrow_limit,
            can_borrow_more: claims.role.is_borrower() && can_borrow(borrow_limit, active_borrows),
            active_sub_loans,
        })
    }
}
