//! Reservation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        reservation::{ReservationDetails, ReservationQuery, ReserveBook},
        Page, Reservation,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse, DEFAULT_PER_PAGE};

/// Reserve a book with no copy on the shelf
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = ReserveBook,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 403, description = "Students and teachers only"),
        (status = 409, description = "Already reserved"),
        (status = 422, description = "Copies available")
    )
)]
pub async fn reserve_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReserveBook>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let reservation = state
        .services
        .reservations
        .reserve_book(&claims, request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Cancel an own pending reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Not pending")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    Ok(Json(state.services.reservations.cancel(&claims, id).await?))
}

/// Pending reservations of students or teachers
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationQuery),
    responses(
        (status = 200, description = "Pending reservations", body = PaginatedResponse<ReservationDetails>),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ReservationQuery>,
) -> AppResult<Json<PaginatedResponse<ReservationDetails>>> {
    claims.require_staff()?;

    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state
        .services
        .reservations
        .list(&claims, &query, page)
        .await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

/// Reservations of one user
#[utoipa::path(
    get,
    path = "/reservations/users/{user_id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Reservations", body = Vec<ReservationDetails>),
        (status = 403, description = "Staff only")
    )
)]
pub async fn user_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    claims.require_staff()?;
    Ok(Json(
        state
            .services
            .reservations
            .user_reservations(&claims, user_id)
            .await?,
    ))
}
