//! Student endpoints

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
        student::{CreateStudent, CreateStudentAccount, Student, StudentQuery, StudentShort, UpdateStudent},
        Page,
    },
    services::import::ImportReport,
    AppState,
};

use super::{csv_attachment, read_csv_upload, AuthenticatedUser, PaginatedResponse, DEFAULT_PER_PAGE};

/// List students
#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    security(("bearer_auth" = [])),
    params(StudentQuery),
    responses(
        (status = 200, description = "List of students", body = PaginatedResponse<StudentShort>),
        (status = 403, description = "Not allowed")
    )
)]
pub async fn list_students(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<StudentQuery>,
) -> AppResult<Json<PaginatedResponse<StudentShort>>> {
    claims.require_manage_collection()?;

    let page = Page::new(query.page, query.per_page, DEFAULT_PER_PAGE);
    let result = state.services.students.search(&claims, &query, page).await?;
    Ok(Json(PaginatedResponse::new(result, page)))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student", body = Student),
        (status = 404, description = "Student not found")
    )
)]
pub async fn get_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Student>> {
    claims.require_manage_collection()?;
    Ok(Json(state.services.students.get(&claims, id).await?))
}

#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    security(("bearer_auth" = [])),
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 409, description = "Child ID already exists")
    )
)]
pub async fn create_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(student): Json<CreateStudent>,
) -> AppResult<(StatusCode, Json<Student>)> {
    claims.require_manage_collection()?;
    student.validate()?;

    let created = state.services.students.create(&claims, student).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Student ID")
    ),
    request_body = UpdateStudent,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Child ID already exists")
    )
)]
pub async fn update_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(update): Json<UpdateStudent>,
) -> AppResult<Json<Student>> {
    claims.require_manage_collection()?;
    update.validate()?;

    Ok(Json(state.services.students.update(&claims, id, update).await?))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Student ID")
    ),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn delete_student(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_manage_collection()?;

    state.services.students.delete(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a login for the student
#[utoipa::path(
    post,
    path = "/students/{id}/account",
    tag = "students",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Student ID")
    ),
    request_body = CreateStudentAccount,
    responses(
        (status = 201, description = "Account created and linked", body = Student),
        (status = 409, description = "Student already has an account or email in use")
    )
)]
pub async fn create_student_account(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<CreateStudentAccount>,
) -> AppResult<(StatusCode, Json<Student>)> {
    claims.require_manage_collection()?;
    request.validate()?;

    let student = state
        .services
        .students
        .create_account(&claims, id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// Import students from a CSV file
#[utoipa::path(
    post,
    path = "/students/import",
    tag = "students",
    security(("bearer_auth" = [])),
    request_body(content = String, content_type = "multipart/form-data", description = "CSV file and optional centre_id"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Unsupported file format or missing columns")
    )
)]
pub async fn import_students(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    claims.require_manage_collection()?;

    let upload = read_csv_upload(multipart).await?;
    let report = state
        .services
        .students
        .import(&claims, &upload.filename, &upload.data, upload.centre_id)
        .await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/students/sample-csv",
    tag = "students",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "CSV template", content_type = "text/csv")
    )
)]
pub async fn students_sample_csv(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    claims.require_manage_collection()?;
    Ok(csv_attachment(
        "students_sample.csv",
        state.services.students.sample_csv(),
    ))
}
