//! Own notifications

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        notification::{NotificationQuery, RecentQuery, UnreadCount},
        Notification, Page,
    },
    AppState,
};

use super::{AuthenticatedUser, MessageResponse, PaginatedResponse, DEFAULT_PER_PAGE};

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Own notifications, newest first", body = PaginatedResponse<Notification>)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<PaginatedResponse<Notification>>> {
    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state
        .services
        .notifications
        .list(claims.user_id, query.unread_only, page)
        .await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

/// Latest notifications for the header dropdown
#[utoipa::path(
    get,
    path = "/notifications/recent",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(RecentQuery),
    responses(
        (status = 200, description = "Latest notifications", body = Vec<Notification>)
    )
)]
pub async fn recent_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(
        state
            .services
            .notifications
            .recent(claims.user_id, query.limit)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unread notifications", body = UnreadCount)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UnreadCount>> {
    let unread = state
        .services
        .notifications
        .unread_count(claims.user_id)
        .await?;
    Ok(Json(UnreadCount { unread }))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Marked as read", body = Notification),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Notification>> {
    Ok(Json(
        state
            .services
            .notifications
            .mark_read(id, claims.user_id)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All marked as read", body = MessageResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    let count = state
        .services
        .notifications
        .mark_all_read(claims.user_id)
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "{} notification(s) marked as read",
        count
    ))))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .services
        .notifications
        .delete(id, claims.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All notifications deleted", body = MessageResponse)
    )
)]
pub async fn clear_all(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    let count = state.services.notifications.clear_all(claims.user_id).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} notification(s) deleted",
        count
    ))))
}
