//! Repository layer for database operations

pub mod books;
pub mod borrows;
pub mod catalogue;
pub mod dashboard;
pub mod notifications;
pub mod organisation;
pub mod reservations;
pub mod students;
pub mod teacher_issues;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub organisation: organisation::OrganisationRepository,
    pub users: users::UsersRepository,
    pub books: books::BooksRepository,
    pub students: students::StudentsRepository,
    pub borrows: borrows::BorrowsRepository,
    pub reservations: reservations::ReservationsRepository,
    pub notifications: notifications::NotificationsRepository,
    pub teacher_issues: teacher_issues::TeacherIssuesRepository,
    pub catalogue: catalogue::CatalogueRepository,
    pub dashboard: dashboard::DashboardRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            organisation: organisation::OrganisationRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            students: students::StudentsRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            reservations: reservations::ReservationsRepository::new(pool.clone()),
            notifications: notifications::NotificationsRepository::new(pool.clone()),
            teacher_issues: teacher_issues::TeacherIssuesRepository::new(pool.clone()),
            catalogue: catalogue::CatalogueRepository::new(pool.clone()),
            dashboard: dashboard::DashboardRepository::new(pool.clone()),
            pool,
        }
    }
}

/// `%term%` in lowercase for `LOWER(col) LIKE $n`, or `None` when the search
/// is blank. `%` and `_` typed by the user are matched literally.
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    let term = search?.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some("  Kifaru ")), Some("%kifaru%".to_string()));
        assert_eq!(like_pattern(Some("50%_off")), Some("%50\\%\\_off%".to_string()));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
