//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    auth, books, borrows, catalogue, dashboard, health, notifications, organisation, reservations,
    students, teacher_issues, users,
};

/// Registers the JWT bearer scheme referenced by `security(("bearer_auth" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LibraryHub API",
        version = "1.0.0",
        description = "School and community library circulation REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        auth::update_profile,
        auth::change_password,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Organisation
        organisation::list_centres,
        organisation::get_centre,
        organisation::create_centre,
        organisation::update_centre,
        organisation::delete_centre,
        organisation::list_schools,
        organisation::schools_by_centre,
        organisation::create_school,
        organisation::list_grades,
        organisation::list_categories,
        organisation::list_subjects,
        organisation::create_subject,
        organisation::seed_reference_data,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::import_books,
        books::books_sample_csv,
        // Students
        students::list_students,
        students::get_student,
        students::create_student,
        students::update_student,
        students::delete_student,
        students::create_student_account,
        students::import_students,
        students::students_sample_csv,
        // Borrower circulation
        borrows::request_borrow,
        borrows::my_borrows,
        borrows::cancel_borrow,
        borrows::renew_borrow,
        borrows::teacher_books,
        borrows::bulk_borrow_request,
        borrows::bulk_reserve,
        // Staff circulation
        borrows::pending_requests,
        borrows::user_pending_requests,
        borrows::issue_borrow,
        borrows::reject_borrow,
        borrows::bulk_issue,
        borrows::bulk_reject,
        borrows::active_borrows,
        borrows::user_active_borrows,
        borrows::user_history,
        borrows::receive_return,
        borrows::borrow_history,
        // Reservations
        reservations::reserve_book,
        reservations::cancel_reservation,
        reservations::list_reservations,
        reservations::user_reservations,
        // Notifications
        notifications::list_notifications,
        notifications::recent_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        notifications::clear_all,
        // Teacher sub-lending
        teacher_issues::my_books,
        teacher_issues::issue_to_student,
        teacher_issues::manage_book,
        teacher_issues::receive_return,
        teacher_issues::all_issues,
        teacher_issues::update_issue,
        // Catalogue
        catalogue::add_to_catalogue,
        catalogue::list_catalogue,
        catalogue::view_entry,
        catalogue::update_entry,
        catalogue::delete_entry,
        catalogue::books_by_centre,
        // Dashboard
        dashboard::dashboard,
    ),
    components(
        schemas(
            // Common
            crate::api::MessageResponse,
            crate::models::BulkFailure,
            crate::models::BulkReport,
            crate::models::UserWithCount,
            crate::models::UserType,
            crate::services::import::ImportReport,
            // Users
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            crate::models::user::UpdateProfile,
            crate::models::user::ChangePassword,
            // Organisation
            crate::models::organisation::Centre,
            crate::models::organisation::CentreDetails,
            crate::models::organisation::CentreInput,
            crate::models::organisation::School,
            crate::models::organisation::CreateSchool,
            crate::models::organisation::Grade,
            crate::models::organisation::Category,
            crate::models::organisation::Subject,
            crate::models::organisation::CreateSubject,
            crate::models::organisation::SeedReport,
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookDetails,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Students
            crate::models::student::Student,
            crate::models::student::StudentShort,
            crate::models::student::CreateStudent,
            crate::models::student::UpdateStudent,
            crate::models::student::CreateStudentAccount,
            // Borrows
            crate::models::borrow::Borrow,
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::RequestBorrow,
            crate::models::borrow::RequestOutcome,
            crate::models::borrow::BorrowRequestResponse,
            crate::models::borrow::MyBorrows,
            crate::models::borrow::IssueBorrow,
            crate::models::borrow::RejectBorrow,
            crate::models::borrow::BulkBookRequest,
            crate::models::borrow::BulkIssue,
            crate::models::borrow::BulkReject,
            crate::models::borrow::BulkBookReport,
            // Reservations
            crate::models::reservation::Reservation,
            crate::models::reservation::ReservationDetails,
            crate::models::reservation::ReservationStatus,
            crate::models::reservation::ReserveBook,
            // Notifications
            crate::models::notification::Notification,
            crate::models::notification::NotificationType,
            crate::models::notification::UnreadCount,
            // Teacher sub-lending
            crate::models::teacher_issue::TeacherBookIssue,
            crate::models::teacher_issue::TeacherIssueDetails,
            crate::models::teacher_issue::TeacherIssueStatus,
            crate::models::teacher_issue::TeacherBook,
            crate::models::teacher_issue::ManagedBook,
            crate::models::teacher_issue::IssueToStudent,
            crate::models::teacher_issue::UpdateTeacherIssue,
            // Catalogue
            crate::models::catalogue::CatalogueEntry,
            crate::models::catalogue::CatalogueDetails,
            crate::models::catalogue::AddToCatalogue,
            crate::models::catalogue::UpdateCatalogue,
            crate::models::catalogue::CatalogueOutcome,
            crate::models::catalogue::CatalogueResponse,
            // Dashboard
            crate::models::dashboard::Dashboard,
            crate::models::dashboard::StaffTotals,
            crate::models::dashboard::BorrowerSummary,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication and own account"),
        (name = "users", description = "User management"),
        (name = "organisation", description = "Centres, schools and reference data"),
        (name = "books", description = "Book management and CSV import"),
        (name = "students", description = "Student records and CSV import"),
        (name = "borrows", description = "Borrower circulation"),
        (name = "circulation", description = "Staff circulation desk"),
        (name = "reservations", description = "Reservations"),
        (name = "notifications", description = "Own notifications"),
        (name = "teacher", description = "Teacher sub-lending"),
        (name = "catalogue", description = "Shelf locations"),
        (name = "dashboard", description = "Role dependent dashboard")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/borrows/{id}/issue"));
    }
}
