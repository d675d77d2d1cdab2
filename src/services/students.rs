//! Student records, their login accounts and the CSV import

use validator::ValidateEmail;

use crate::{
    error::{AppError, AppResult},
    models::{
        student::{
            split_name, student_account_email, CreateStudent, CreateStudentAccount, Student,
            StudentQuery, StudentShort, UpdateStudent,
        },
        user::{CentreScope, Role, UserClaims},
        BulkFailure, Page,
    },
    repository::{users::NewUser, Repository},
};

use super::{
    books::row_error,
    import::{self, ImportReport, StudentRow},
    users::hash_password,
};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct StudentsService {
    repository: Repository,
}

impl StudentsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn search(
        &self,
        claims: &UserClaims,
        query: &StudentQuery,
        page: Page,
    ) -> AppResult<(Vec<StudentShort>, i64)> {
        self.repository
            .students
            .search(query, claims.scope().filter(), page)
            .await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<Student> {
        let student = self.repository.students.get_by_id(id).await?;
        claims.require_centre(student.centre_id)?;
        Ok(student)
    }

    async fn ensure_child_id_free(&self, child_id: Option<i64>, exclude_id: Option<i32>) -> AppResult<()> {
        if let Some(child_id) = child_id {
            if self.repository.students.child_id_exists(child_id, exclude_id).await? {
                return Err(AppError::Conflict("Child ID already exists".to_string()));
            }
        }
        Ok(())
    }

    async fn resolve_centre(
        &self,
        claims: &UserClaims,
        school_id: Option<i32>,
        centre_id: Option<i32>,
    ) -> AppResult<Option<i32>> {
        let centre_id = match (school_id, centre_id, claims.scope()) {
            (Some(school_id), _, _) => {
                Some(self.repository.organisation.get_school(school_id).await?.centre_id)
            }
            (None, Some(centre_id), _) => Some(centre_id),
            (None, None, CentreScope::Only(own)) => Some(own),
            (None, None, _) => None,
        };
        claims.require_centre(centre_id)?;
        Ok(centre_id)
    }

    pub async fn create(&self, claims: &UserClaims, student: CreateStudent) -> AppResult<Student> {
        let centre_id = self
            .resolve_centre(claims, student.school_id, student.centre_id)
            .await?;
        self.ensure_child_id_free(student.child_id, None).await?;

        let created = self.repository.students.create(&student, centre_id).await?;
        tracing::info!(student_id = created.id, ?centre_id, "Student created");
        Ok(created)
    }

    pub async fn update(
        &self,
        claims: &UserClaims,
        id: i32,
        update: UpdateStudent,
    ) -> AppResult<Student> {
        let student = self.get(claims, id).await?;
        self.ensure_child_id_free(update.child_id, Some(id)).await?;

        // A student belongs to the centre of its school
        let centre_id = match update.school_id {
            Some(school_id) => {
                let school = self.repository.organisation.get_school(school_id).await?;
                claims.require_centre(Some(school.centre_id))?;
                Some(school.centre_id)
            }
            None => student.centre_id,
        };

        let updated = self.repository.students.update(id, &update, centre_id).await?;
        if updated.centre_id != student.centre_id {
            tracing::info!(
                student_id = id,
                from = ?student.centre_id,
                to = ?updated.centre_id,
                "Student moved to another centre"
            );
        }
        Ok(updated)
    }

    pub async fn delete(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        self.get(claims, id).await?;
        self.repository.students.delete(id).await?;
        tracing::info!(student_id = id, "Student deleted");
        Ok(())
    }

    /// Creates a `student` user linked to the record so the student can log
    /// in with its child ID.
    pub async fn create_account(
        &self,
        claims: &UserClaims,
        id: i32,
        request: CreateStudentAccount,
    ) -> AppResult<Student> {
        let student = self.get(claims, id).await?;
        self.link_account(&student, request.email.as_deref(), &request.password)
            .await
    }

    async fn link_account(
        &self,
        student: &Student,
        email: Option<&str>,
        password: &str,
    ) -> AppResult<Student> {
        if student.user_id.is_some() {
            return Err(AppError::Conflict(
                "This student already has a user account".to_string(),
            ));
        }

        let email = email
            .map(|e| e.trim().to_string())
            .unwrap_or_else(|| student_account_email(student.child_id, student.id));
        if self.repository.users.email_exists(&email, None).await? {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }

        let (first_name, last_name) = split_name(&student.name);
        let linked = self
            .repository
            .students
            .create_account(
                student.id,
                &NewUser {
                    email,
                    password_hash: hash_password(password)?,
                    first_name,
                    last_name,
                    role: Role::Student,
                    centre_id: student.centre_id,
                    force_password_change: true,
                },
            )
            .await?;
        tracing::info!(student_id = student.id, user_id = ?linked.user_id, "Student account created");
        Ok(linked)
    }

    /// Imports students from a CSV upload. Schools and grades are matched by
    /// name; an unknown name fails the row.
    pub async fn import(
        &self,
        claims: &UserClaims,
        filename: &str,
        data: &[u8],
        centre_id: Option<i32>,
    ) -> AppResult<ImportReport> {
        import::ensure_csv(filename)?;
        let centre_id = self.resolve_centre(claims, None, centre_id).await?;
        let rows = import::parse_students(data)?;
        let mut report = ImportReport::default();

        for row in rows {
            let (line, row) = match row {
                Ok(parsed) => parsed,
                Err(failure) => {
                    report.failed.push(failure);
                    continue;
                }
            };

            match self.import_row(centre_id, &row).await {
                Ok(None) => report.created += 1,
                Ok(Some(account_error)) => {
                    report.created += 1;
                    report.failed.push(BulkFailure::new(
                        line,
                        format!("Student saved but account not created: {}", account_error),
                    ));
                }
                Err(e) => report.failed.push(BulkFailure::new(line, row_error(&e))),
            }
        }

        tracing::info!(
            ?centre_id,
            created = report.created,
            failed = report.failed.len(),
            "Students imported"
        );
        Ok(report.finish("students"))
    }

    /// Saves one row. Returns the reason the optional account was not
    /// created, if any.
    async fn import_row(&self, centre_id: Option<i32>, row: &StudentRow) -> AppResult<Option<String>> {
        check_account_fields(row).map_err(AppError::BadRequest)?;

        let school = match row.school.as_deref() {
            Some(name) => Some(
                self.repository
                    .organisation
                    .find_school_by_name(centre_id, name)
                    .await?
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown school '{}'", name)))?,
            ),
            None => None,
        };
        let grade = match row.grade.as_deref() {
            Some(name) => Some(
                self.repository
                    .organisation
                    .find_grade_by_name(name)
                    .await?
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown grade '{}'", name)))?,
            ),
            None => None,
        };

        self.ensure_child_id_free(row.child_id, None).await?;

        let centre_id = school.as_ref().map(|s| s.centre_id).or(centre_id);
        let student = self
            .repository
            .students
            .create(
                &CreateStudent {
                    name: row.name.clone(),
                    child_id: row.child_id,
                    centre_id,
                    school_id: school.map(|s| s.id),
                    grade_id: grade.map(|g| g.id),
                },
                centre_id,
            )
            .await?;

        match row.password.as_deref() {
            Some(password) => Ok(self
                .link_account(&student, row.email.as_deref(), password)
                .await
                .err()
                .map(|e| row_error(&e))),
            None => Ok(None),
        }
    }

    pub fn sample_csv(&self) -> &'static str {
        import::STUDENTS_SAMPLE_CSV
    }
}

/// Account columns are optional, but an email needs a password and both
/// must be well formed.
fn check_account_fields(row: &StudentRow) -> Result<(), String> {
    match (row.email.as_deref(), row.password.as_deref()) {
        (Some(_), None) => Err("Password required to create an account".to_string()),
        (Some(email), Some(_)) if !email.to_string().validate_email() => {
            Err(format!("Invalid email '{}'", email))
        }
        (_, Some(password)) if password.len() < MIN_PASSWORD_LEN => Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: Option<&str>, password: Option<&str>) -> StudentRow {
        StudentRow {
            name: "Amina Wanjiru".into(),
            child_id: Some(100234),
            school: None,
            grade: None,
            email: email.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn account_columns_are_checked() {
        assert!(check_account_fields(&row(None, None)).is_ok());
        assert!(check_account_fields(&row(None, Some("longenough"))).is_ok());
        assert!(check_account_fields(&row(Some("amina@school.test"), Some("longenough"))).is_ok());

        assert!(check_account_fields(&row(Some("amina@school.test"), None)).is_err());
        assert!(check_account_fields(&row(Some("not-an-email"), Some("longenough"))).is_err());
        assert!(check_account_fields(&row(None, Some("short"))).is_err());
    }
}
