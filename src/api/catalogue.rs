//! Catalogue (shelf location) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        catalogue::{
            AddToCatalogue, CatalogueDetails, CatalogueOutcome, CatalogueQuery, CatalogueResponse,
            CentreBooksQuery, UpdateCatalogue,
        },
        BookShort, CatalogueEntry, Page,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse, DEFAULT_PER_PAGE};

/// Put a book on a shelf, or move it when already catalogued
#[utoipa::path(
    post,
    path = "/catalogue",
    tag = "catalogue",
    security(("bearer_auth" = [])),
    request_body = AddToCatalogue,
    responses(
        (status = 201, description = "Book catalogued", body = CatalogueResponse),
        (status = 200, description = "Existing entry updated", body = CatalogueResponse),
        (status = 400, description = "Book and shelf are required"),
        (status = 409, description = "Shelf already in use")
    )
)]
pub async fn add_to_catalogue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<AddToCatalogue>,
) -> AppResult<(StatusCode, Json<CatalogueResponse>)> {
    claims.require_manage_collection()?;
    request.validate()?;

    let response = state.services.catalogue.add(&claims, request).await?;
    let status = match response.outcome {
        CatalogueOutcome::Created => StatusCode::CREATED,
        CatalogueOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(response)))
}

#[utoipa::path(
    get,
    path = "/catalogue",
    tag = "catalogue",
    security(("bearer_auth" = [])),
    params(CatalogueQuery),
    responses(
        (status = 200, description = "Catalogue ordered by shelf", body = PaginatedResponse<CatalogueDetails>)
    )
)]
pub async fn list_catalogue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<CatalogueQuery>,
) -> AppResult<Json<PaginatedResponse<CatalogueDetails>>> {
    claims.require_manage_collection()?;

    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state.services.catalogue.list(&claims, &query, page).await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

#[utoipa::path(
    get,
    path = "/catalogue/{id}",
    tag = "catalogue",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Catalogue entry ID")
    ),
    responses(
        (status = 200, description = "Catalogue entry", body = CatalogueDetails),
        (status = 404, description = "Entry not found")
    )
)]
pub async fn view_entry(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CatalogueDetails>> {
    claims.require_manage_collection()?;
    Ok(Json(state.services.catalogue.view(&claims, id).await?))
}

#[utoipa::path(
    put,
    path = "/catalogue/{id}",
    tag = "catalogue",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Catalogue entry ID")
    ),
    request_body = UpdateCatalogue,
    responses(
        (status = 200, description = "Entry updated", body = CatalogueEntry),
        (status = 409, description = "Shelf already in use")
    )
)]
pub async fn update_entry(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateCatalogue>,
) -> AppResult<Json<CatalogueEntry>> {
    claims.require_manage_collection()?;
    update.validate()?;

    Ok(Json(state.services.catalogue.update(&claims, id, update).await?))
}

#[utoipa::path(
    delete,
    path = "/catalogue/{id}",
    tag = "catalogue",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Catalogue entry ID")
    ),
    responses(
        (status = 204, description = "Entry removed"),
        (status = 404, description = "Entry not found")
    )
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_manage_collection()?;

    state.services.catalogue.delete(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Active books of a centre without a shelf (lookup for the add form)
#[utoipa::path(
    get,
    path = "/catalogue/books-by-centre",
    tag = "catalogue",
    security(("bearer_auth" = [])),
    params(CentreBooksQuery),
    responses(
        (status = 200, description = "Uncatalogued books", body = Vec<BookShort>),
        (status = 400, description = "centre_id is required"),
        (status = 403, description = "Another centre")
    )
)]
pub async fn books_by_centre(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<CentreBooksQuery>,
) -> AppResult<Json<Vec<BookShort>>> {
    claims.require_manage_collection()?;
    Ok(Json(
        state
            .services
            .catalogue
            .books_by_centre(&claims, query.centre_id)
            .await?,
    ))
}
