//! Teacher sub-lending endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        teacher_issue::{
            IssueToStudent, ManagedBook, TeacherBook, TeacherIssueDetails, TeacherIssueQuery,
            UpdateTeacherIssue,
        },
        Page, TeacherBookIssue,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse, DEFAULT_PER_PAGE};

/// Issued borrows of the teacher with their active sub-loan counts
#[utoipa::path(
    get,
    path = "/teacher/my-books",
    tag = "teacher",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrowed books", body = Vec<TeacherBook>),
        (status = 403, description = "Teachers only")
    )
)]
pub async fn my_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<TeacherBook>>> {
    Ok(Json(state.services.teacher_issues.my_books(&claims).await?))
}

#[utoipa::path(
    post,
    path = "/teacher/borrows/{borrow_id}/issue",
    tag = "teacher",
    security(("bearer_auth" = [])),
    params(
        ("borrow_id" = i32, Path, description = "Teacher's issued borrow")
    ),
    request_body = IssueToStudent,
    responses(
        (status = 201, description = "Book lent to student", body = TeacherBookIssue),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn issue_to_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
    Json(request): Json<IssueToStudent>,
) -> AppResult<(StatusCode, Json<TeacherBookIssue>)> {
    request.validate()?;

    let issue = state
        .services
        .teacher_issues
        .issue_to_student(&claims, borrow_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

/// A borrowed book with its active and returned sub-loans
#[utoipa::path(
    get,
    path = "/teacher/borrows/{borrow_id}",
    tag = "teacher",
    security(("bearer_auth" = [])),
    params(
        ("borrow_id" = i32, Path, description = "Teacher's issued borrow")
    ),
    responses(
        (status = 200, description = "Book and sub-loans", body = ManagedBook),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn manage_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<i32>,
) -> AppResult<Json<ManagedBook>> {
    Ok(Json(
        state
            .services
            .teacher_issues
            .manage_book(&claims, borrow_id)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/teacher/issues/{id}/return",
    tag = "teacher",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Sub-loan ID")
    ),
    responses(
        (status = 200, description = "Sub-loan returned", body = TeacherBookIssue),
        (status = 404, description = "Sub-loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn receive_return(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TeacherBookIssue>> {
    Ok(Json(
        state
            .services
            .teacher_issues
            .receive_return(&claims, id)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/teacher/issues",
    tag = "teacher",
    security(("bearer_auth" = [])),
    params(TeacherIssueQuery),
    responses(
        (status = 200, description = "Sub-loans", body = PaginatedResponse<TeacherIssueDetails>)
    )
)]
pub async fn all_issues(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<TeacherIssueQuery>,
) -> AppResult<Json<PaginatedResponse<TeacherIssueDetails>>> {
    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state
        .services
        .teacher_issues
        .all_issues(&claims, &query, page)
        .await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

#[utoipa::path(
    put,
    path = "/teacher/issues/{id}",
    tag = "teacher",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Sub-loan ID")
    ),
    request_body = UpdateTeacherIssue,
    responses(
        (status = 200, description = "Sub-loan updated", body = TeacherBookIssue),
        (status = 404, description = "Sub-loan not found")
    )
)]
pub async fn update_issue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateTeacherIssue>,
) -> AppResult<Json<TeacherBookIssue>> {
    update.validate()?;
    Ok(Json(
        state
            .services
            .teacher_issues
            .update_issue(&claims, id, update)
            .await?,
    ))
}
