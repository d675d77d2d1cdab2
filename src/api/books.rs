//! Book endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::Multipart;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookDetails, BookQuery, BookShort, CreateBook, UpdateBook},
        Page,
    },
    services::import::ImportReport,
    AppState,
};

use super::{csv_attachment, read_csv_upload, AuthenticatedUser, PaginatedResponse, DEFAULT_PER_PAGE};

/// List books visible to the caller
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "List of books", body = PaginatedResponse<BookShort>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<BookShort>>> {
    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state.services.books.search(&claims, &query, page).await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

/// Book details with its shelf
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.books.get(&claims, id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Book code already exists in the centre")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_manage_collection()?;
    book.validate()?;

    let created = state.services.books.create(&claims, book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book code already exists in the centre")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    claims.require_manage_collection()?;
    update.validate()?;

    let book = state.services.books.update(&claims, id, update).await?;
    Ok(Json(book))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_manage_collection()?;

    state.services.books.delete(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Import books from a CSV file (`file` part, optional `centre_id` part)
#[utoipa::path(
    post,
    path = "/books/import",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body(content = String, content_type = "multipart/form-data", description = "CSV file and optional centre_id"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Unsupported file format or missing columns")
    )
)]
pub async fn import_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    claims.require_manage_collection()?;

    let upload = read_csv_upload(multipart).await?;
    let report = state
        .services
        .books
        .import(&claims, &upload.filename, &upload.data, upload.centre_id)
        .await?;
    Ok(Json(report))
}

/// Download the book import template
#[utoipa::path(
    get,
    path = "/books/sample-csv",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "CSV template", content_type = "text/csv")
    )
)]
pub async fn books_sample_csv(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    claims.require_manage_collection()?;
    Ok(csv_attachment("books_sample.csv", state.services.books.sample_csv()))
}
