//! Centres, schools and reference data lookups

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::organisation::{
        Category, Centre, CentreDetails, CentreInput, CreateSchool, CreateSubject, Grade, School,
        SchoolQuery, SeedReport, Subject, SubjectQuery,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List centres
#[utoipa::path(
    get,
    path = "/centres",
    tag = "organisation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All centres", body = Vec<Centre>)
    )
)]
pub async fn list_centres(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Centre>>> {
    let centres = state.services.organisation.list_centres().await?;
    Ok(Json(centres))
}

/// Centre with its school and book counts
#[utoipa::path(
    get,
    path = "/centres/{id}",
    tag = "organisation",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Centre ID")
    ),
    responses(
        (status = 200, description = "Centre details", body = CentreDetails),
        (status = 404, description = "Centre not found")
    )
)]
pub async fn get_centre(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CentreDetails>> {
    let centre = state.services.organisation.get_centre(id).await?;
    Ok(Json(centre))
}

/// Create a centre
#[utoipa::path(
    post,
    path = "/centres",
    tag = "organisation",
    security(("bearer_auth" = [])),
    request_body = CentreInput,
    responses(
        (status = 201, description = "Centre created", body = Centre),
        (status = 409, description = "Centre code already exists")
    )
)]
pub async fn create_centre(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<CentreInput>,
) -> AppResult<(StatusCode, Json<Centre>)> {
    claims.require_admin()?;
    input.validate()?;

    let centre = state.services.organisation.create_centre(input).await?;
    Ok((StatusCode::CREATED, Json(centre)))
}

/// Update a centre
#[utoipa::path(
    put,
    path = "/centres/{id}",
    tag = "organisation",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Centre ID")
    ),
    request_body = CentreInput,
    responses(
        (status = 200, description = "Centre updated", body = Centre),
        (status = 404, description = "Centre not found"),
        (status = 409, description = "Centre code already exists")
    )
)]
pub async fn update_centre(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<CentreInput>,
) -> AppResult<Json<Centre>> {
    claims.require_admin()?;
    input.validate()?;

    let centre = state.services.organisation.update_centre(id, input).await?;
    Ok(Json(centre))
}

/// Delete a centre
#[utoipa::path(
    delete,
    path = "/centres/{id}",
    tag = "organisation",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Centre ID")
    ),
    responses(
        (status = 204, description = "Centre deleted"),
        (status = 404, description = "Centre not found")
    )
)]
pub async fn delete_centre(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.organisation.delete_centre(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List schools, optionally of one centre
#[utoipa::path(
    get,
    path = "/schools",
    tag = "organisation",
    security(("bearer_auth" = [])),
    params(SchoolQuery),
    responses(
        (status = 200, description = "Schools", body = Vec<School>),
        (status = 403, description = "Another centre")
    )
)]
pub async fn list_schools(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<SchoolQuery>,
) -> AppResult<Json<Vec<School>>> {
    let schools = state
        .services
        .organisation
        .list_schools(claims.scope(), query.centre_id)
        .await?;
    Ok(Json(schools))
}

/// Schools of a centre (lookup for forms)
#[utoipa::path(
    get,
    path = "/centres/{id}/schools",
    tag = "organisation",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Centre ID")
    ),
    responses(
        (status = 200, description = "Schools of the centre", body = Vec<School>),
        (status = 403, description = "Another centre")
    )
)]
pub async fn schools_by_centre(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(centre_id): Path<i32>,
) -> AppResult<Json<Vec<School>>> {
    let schools = state
        .services
        .organisation
        .list_schools(claims.scope(), Some(centre_id))
        .await?;
    Ok(Json(schools))
}

/// Create a school
#[utoipa::path(
    post,
    path = "/schools",
    tag = "organisation",
    security(("bearer_auth" = [])),
    request_body = CreateSchool,
    responses(
        (status = 201, description = "School created", body = School),
        (status = 404, description = "Centre not found"),
        (status = 409, description = "School code already exists")
    )
)]
pub async fn create_school(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<CreateSchool>,
) -> AppResult<(StatusCode, Json<School>)> {
    claims.require_admin()?;
    input.validate()?;

    let school = state.services.organisation.create_school(input).await?;
    Ok((StatusCode::CREATED, Json(school)))
}

/// Grades in teaching order
#[utoipa::path(
    get,
    path = "/grades",
    tag = "organisation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Grades", body = Vec<Grade>)
    )
)]
pub async fn list_grades(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Grade>>> {
    Ok(Json(state.services.organisation.list_grades().await?))
}

#[utoipa::path(
    get,
    path = "/categories",
    tag = "organisation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories", body = Vec<Category>)
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.services.organisation.list_categories().await?))
}

/// Subjects, filtered by grade and category
#[utoipa::path(
    get,
    path = "/subjects",
    tag = "organisation",
    security(("bearer_auth" = [])),
    params(SubjectQuery),
    responses(
        (status = 200, description = "Subjects", body = Vec<Subject>)
    )
)]
pub async fn list_subjects(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<SubjectQuery>,
) -> AppResult<Json<Vec<Subject>>> {
    Ok(Json(state.services.organisation.list_subjects(&query).await?))
}

#[utoipa::path(
    post,
    path = "/subjects",
    tag = "organisation",
    security(("bearer_auth" = [])),
    request_body = CreateSubject,
    responses(
        (status = 201, description = "Subject created", body = Subject),
        (status = 409, description = "Subject already exists")
    )
)]
pub async fn create_subject(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<CreateSubject>,
) -> AppResult<(StatusCode, Json<Subject>)> {
    claims.require_admin()?;
    input.validate()?;

    let subject = state.services.organisation.create_subject(input).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

/// Insert the standard grades, categories and subjects
#[utoipa::path(
    post,
    path = "/admin/seed",
    tag = "organisation",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rows inserted per table", body = SeedReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn seed_reference_data(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SeedReport>> {
    claims.require_admin()?;
    Ok(Json(state.services.organisation.seed_reference_data().await?))
}
