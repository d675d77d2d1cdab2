//! Business logic services

pub mod books;
pub mod catalogue;
pub mod circulation;
pub mod dashboard;
pub mod email;
pub mod import;
pub mod maintenance;
pub mod notifications;
pub mod organisation;
pub mod reservations;
pub mod students;
pub mod teacher_issues;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::AppResult,
    models::user::{User, UserClaims},
    repository::Repository,
};

use email::Mailer;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub organisation: organisation::OrganisationService,
    pub books: books::BooksService,
    pub students: students::StudentsService,
    pub circulation: circulation::CirculationService,
    pub reservations: reservations::ReservationsService,
    pub notifications: notifications::NotificationsService,
    pub teacher_issues: teacher_issues::TeacherIssuesService,
    pub catalogue: catalogue::CatalogueService,
    pub dashboard: dashboard::DashboardService,
    pub maintenance: maintenance::MaintenanceService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let rules = config.circulation.clone();
        let notifications = notifications::NotificationsService::new(
            repository.clone(),
            mailer,
            config.email.enabled,
        );
        let reservations = reservations::ReservationsService::new(
            repository.clone(),
            rules.clone(),
            notifications.clone(),
        );

        Self {
            users: users::UsersService::new(
                repository.clone(),
                config.auth.clone(),
                notifications.clone(),
                rules.reservation_hold_days,
            ),
            organisation: organisation::OrganisationService::new(repository.clone()),
            books: books::BooksService::new(repository.clone()),
            students: students::StudentsService::new(repository.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                rules.clone(),
                notifications.clone(),
                reservations.clone(),
            ),
            teacher_issues: teacher_issues::TeacherIssuesService::new(
                repository.clone(),
                rules.teacher_issue_default_days,
            ),
            catalogue: catalogue::CatalogueService::new(repository.clone()),
            dashboard: dashboard::DashboardService::new(repository.clone(), rules),
            maintenance: maintenance::MaintenanceService::new(
                repository,
                reservations.clone(),
                notifications.clone(),
            ),
            reservations,
            notifications,
        }
    }
}

/// Loads a user the caller is allowed to see
pub(crate) async fn scoped_user(
    repository: &Repository,
    claims: &UserClaims,
    user_id: i32,
) -> AppResult<User> {
    let user = repository.users.get_by_id(user_id).await?;
    claims.require_user(&user)?;
    Ok(user)
}
