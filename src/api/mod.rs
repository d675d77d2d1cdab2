//! API handlers for LibraryHub REST endpoints

pub mod auth;
pub mod books;
pub mod borrows;
pub mod catalogue;
pub mod dashboard;
pub mod health;
pub mod notifications;
pub mod openapi;
pub mod organisation;
pub mod reservations;
pub mod students;
pub mod teacher_issues;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{user::UserClaims, Page},
    AppState,
};

/// Default page size of listings
pub const DEFAULT_PER_PAGE: i64 = 20;

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// List of items
    pub items: Vec<T>,
    /// Total number of items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new((items, total): (Vec<T>, i64), page: Page) -> Self {
        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        }
    }
}

/// Plain confirmation body for actions without a payload
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A CSV file posted as `multipart/form-data`
pub struct CsvUpload {
    pub filename: String,
    pub data: Vec<u8>,
    pub centre_id: Option<i32>,
}

/// Reads the `file` part and the optional `centre_id` part of an upload
pub async fn read_csv_upload(mut multipart: axum_extra::extract::Multipart) -> Result<CsvUpload, AppError> {
    let bad_upload = |e: axum_extra::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid upload: {}", e))
    };

    let mut file = None;
    let mut centre_id = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_upload)?;
                file = Some((filename, data.to_vec()));
            }
            Some("centre_id") => {
                let text = field.text().await.map_err(bad_upload)?;
                let text = text.trim();
                if !text.is_empty() {
                    centre_id = Some(text.parse().map_err(|_| {
                        AppError::BadRequest(format!("Invalid centre_id '{}'", text))
                    })?);
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::BadRequest("Please select a file to upload".to_string()))?;
    Ok(CsvUpload {
        filename,
        data,
        centre_id,
    })
}

/// CSV attachment response
pub fn csv_attachment(
    filename: &str,
    body: &'static str,
) -> ([(axum::http::HeaderName, String); 2], &'static str) {
    use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}
