//! Borrow endpoints: borrower actions and staff circulation

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        borrow::{
            ActiveBorrowListing, ActiveBorrowQuery, BorrowHistoryQuery, BorrowRequestResponse,
            BulkBookReport, BulkBookRequest, BulkIssue, BulkReject, IssueBorrow, MyBorrows,
            PendingQuery, RejectBorrow, RequestBorrow, RequestOutcome, TeacherBookQuery,
        },
        BookShort, Borrow, BorrowDetails, BulkReport, Page, UserWithCount,
    },
    AppState,
};

use super::{AuthenticatedUser, MessageResponse, PaginatedResponse, DEFAULT_PER_PAGE};

/// Borrow history pages are larger than other listings
const HISTORY_PER_PAGE: i64 = 50;

/// Active borrows page: borrows for students, grouped users for teachers
#[derive(Serialize)]
pub struct ActiveBorrowsResponse {
    pub items: ActiveBorrowListing,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Request a book; reserves it when no copy is available
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = RequestBorrow,
    responses(
        (status = 201, description = "Borrow requested", body = BorrowRequestResponse),
        (status = 202, description = "Book unavailable, reserved instead", body = BorrowRequestResponse),
        (status = 403, description = "Not a borrower"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Already borrowing or reserved"),
        (status = 422, description = "Borrow limit reached")
    )
)]
pub async fn request_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<RequestBorrow>,
) -> AppResult<(StatusCode, Json<BorrowRequestResponse>)> {
    request.validate()?;

    let response = state
        .services
        .circulation
        .request_borrow(&claims, request)
        .await?;
    let status = match response.outcome {
        RequestOutcome::Requested => StatusCode::CREATED,
        RequestOutcome::Reserved => StatusCode::ACCEPTED,
    };
    Ok((status, Json(response)))
}

/// Own borrows, reservations and borrow limit
#[utoipa::path(
    get,
    path = "/borrows/my",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own circulation", body = MyBorrows)
    )
)]
pub async fn my_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MyBorrows>> {
    Ok(Json(state.services.circulation.my_borrows(&claims).await?))
}

/// Cancel an own request that was not issued yet
#[utoipa::path(
    post,
    path = "/borrows/{id}/cancel",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Request cancelled", body = MessageResponse),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Not a pending request")
    )
)]
pub async fn cancel_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    state.services.circulation.cancel(&claims, id).await?;
    Ok(Json(MessageResponse::new("Borrow request cancelled")))
}

/// Renew an own issued borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/renew",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Borrow renewed", body = Borrow),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Not issued"),
        (status = 422, description = "Maximum renewals reached")
    )
)]
pub async fn renew_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Borrow>> {
    Ok(Json(state.services.circulation.renew(&claims, id).await?))
}

/// Books of the teacher's centre
#[utoipa::path(
    get,
    path = "/teacher/books",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(TeacherBookQuery),
    responses(
        (status = 200, description = "Books", body = PaginatedResponse<BookShort>),
        (status = 403, description = "Teachers only")
    )
)]
pub async fn teacher_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<TeacherBookQuery>,
) -> AppResult<Json<PaginatedResponse<BookShort>>> {
    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state
        .services
        .circulation
        .teacher_books(&claims, query, page)
        .await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

/// Request several books at once
#[utoipa::path(
    post,
    path = "/teacher/bulk-request",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BulkBookRequest,
    responses(
        (status = 200, description = "Per-book report", body = BulkBookReport),
        (status = 403, description = "Teachers only")
    )
)]
pub async fn bulk_borrow_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BulkBookRequest>,
) -> AppResult<Json<BulkBookReport>> {
    request.validate()?;
    Ok(Json(
        state
            .services
            .circulation
            .bulk_borrow_request(&claims, &request.book_ids)
            .await?,
    ))
}

/// Reserve several unavailable books at once
#[utoipa::path(
    post,
    path = "/teacher/bulk-reserve",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BulkBookRequest,
    responses(
        (status = 200, description = "Per-book report", body = BulkBookReport),
        (status = 403, description = "Teachers only")
    )
)]
pub async fn bulk_reserve(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BulkBookRequest>,
) -> AppResult<Json<BulkBookReport>> {
    request.validate()?;
    Ok(Json(
        state
            .services
            .circulation
            .bulk_reserve(&claims, &request.book_ids)
            .await?,
    ))
}

/// Users with pending requests, most requests first
#[utoipa::path(
    get,
    path = "/borrows/pending",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(PendingQuery),
    responses(
        (status = 200, description = "Users with pending requests", body = PaginatedResponse<UserWithCount>),
        (status = 403, description = "Staff only")
    )
)]
pub async fn pending_requests(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<PendingQuery>,
) -> AppResult<Json<PaginatedResponse<UserWithCount>>> {
    claims.require_staff()?;

    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state
        .services
        .circulation
        .pending_requests(&claims, query.search.as_deref(), page)
        .await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

/// Pending requests of one user
#[utoipa::path(
    get,
    path = "/borrows/users/{user_id}/pending",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Requested borrows", body = Vec<BorrowDetails>),
        (status = 403, description = "Staff only")
    )
)]
pub async fn user_pending_requests(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    claims.require_staff()?;
    Ok(Json(
        state
            .services
            .circulation
            .user_pending_requests(&claims, user_id)
            .await?,
    ))
}

/// Issue a requested borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/issue",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    request_body = IssueBorrow,
    responses(
        (status = 200, description = "Borrow issued", body = Borrow),
        (status = 400, description = "Invalid loan period"),
        (status = 409, description = "Already processed"),
        (status = 422, description = "No copy available")
    )
)]
pub async fn issue_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<IssueBorrow>>,
) -> AppResult<Json<Borrow>> {
    claims.require_staff()?;

    let Json(request) = body.unwrap_or_default();
    Ok(Json(
        state
            .services
            .circulation
            .issue(&claims, id, request.days)
            .await?,
    ))
}

/// Reject a requested borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/reject",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    request_body = RejectBorrow,
    responses(
        (status = 200, description = "Request rejected", body = MessageResponse),
        (status = 409, description = "Already processed")
    )
)]
pub async fn reject_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<RejectBorrow>>,
) -> AppResult<Json<MessageResponse>> {
    claims.require_staff()?;

    let Json(request) = body.unwrap_or_default();
    state
        .services
        .circulation
        .reject(&claims, id, request.reason.as_deref())
        .await?;
    Ok(Json(MessageResponse::new("Borrow request rejected")))
}

/// Issue several requests of one user
#[utoipa::path(
    post,
    path = "/borrows/users/{user_id}/bulk-issue",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    request_body = BulkIssue,
    responses(
        (status = 200, description = "Per-borrow report", body = BulkReport),
        (status = 400, description = "Invalid loan period")
    )
)]
pub async fn bulk_issue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Json(request): Json<BulkIssue>,
) -> AppResult<Json<BulkReport>> {
    claims.require_staff()?;
    request.validate()?;

    Ok(Json(
        state
            .services
            .circulation
            .bulk_issue(&claims, user_id, &request.borrow_ids, request.days)
            .await?,
    ))
}

/// Reject several requests of one user
#[utoipa::path(
    post,
    path = "/borrows/users/{user_id}/bulk-reject",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    request_body = BulkReject,
    responses(
        (status = 200, description = "Per-borrow report", body = BulkReport)
    )
)]
pub async fn bulk_reject(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Json(request): Json<BulkReject>,
) -> AppResult<Json<BulkReport>> {
    claims.require_staff()?;
    request.validate()?;

    Ok(Json(
        state
            .services
            .circulation
            .bulk_reject(&claims, user_id, &request.borrow_ids, request.reason.as_deref())
            .await?,
    ))
}

/// Issued borrows: flat for students, grouped per teacher for teachers
#[utoipa::path(
    get,
    path = "/borrows/active",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(ActiveBorrowQuery),
    responses(
        (status = 200, description = "Active borrows"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn active_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ActiveBorrowQuery>,
) -> AppResult<Json<ActiveBorrowsResponse>> {
    claims.require_staff()?;

    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let (items, total) = state
        .services
        .circulation
        .active_borrows(&claims, &query, page)
        .await?;
    Ok(Json(ActiveBorrowsResponse {
        items,
        total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// Issued borrows of one user
#[utoipa::path(
    get,
    path = "/borrows/users/{user_id}/active",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Issued borrows", body = Vec<BorrowDetails>)
    )
)]
pub async fn user_active_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    claims.require_staff()?;
    Ok(Json(
        state
            .services
            .circulation
            .user_active_borrows(&claims, user_id)
            .await?,
    ))
}

/// Every borrow of one user
#[utoipa::path(
    get,
    path = "/borrows/users/{user_id}/history",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Borrow history", body = Vec<BorrowDetails>)
    )
)]
pub async fn user_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    claims.require_staff()?;
    Ok(Json(
        state
            .services
            .circulation
            .user_history(&claims, user_id)
            .await?,
    ))
}

/// Receive a book back
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = Borrow),
        (status = 404, description = "Borrow not found"),
        (status = 409, description = "Not issued")
    )
)]
pub async fn receive_return(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Borrow>> {
    claims.require_staff()?;
    Ok(Json(state.services.circulation.receive_return(&claims, id).await?))
}

/// Borrow history of students or teachers
#[utoipa::path(
    get,
    path = "/borrows/history",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(BorrowHistoryQuery),
    responses(
        (status = 200, description = "Borrow history", body = PaginatedResponse<BorrowDetails>)
    )
)]
pub async fn borrow_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowHistoryQuery>,
) -> AppResult<Json<PaginatedResponse<BorrowDetails>>> {
    claims.require_staff()?;

    let page = Page::new(query.page, query.per_page, HISTORY_PER_PAGE);
    let result = state
        .services
        .circulation
        .borrow_history(&claims, &query, page)
        .await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}
