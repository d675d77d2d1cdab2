//! Centres, schools and reference data

use crate::{
    error::{AppError, AppResult},
    models::{
        organisation::{
            standard_grades, Category, Centre, CentreDetails, CentreInput, CreateSchool,
            CreateSubject, Grade, School, SeedReport, Subject, SubjectQuery, CATEGORY_NAMES,
            GRADED_SUBJECTS,
        },
        user::CentreScope,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct OrganisationService {
    repository: Repository,
}

impl OrganisationService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_centres(&self) -> AppResult<Vec<Centre>> {
        self.repository.organisation.list_centres().await
    }

    pub async fn get_centre(&self, id: i32) -> AppResult<CentreDetails> {
        self.repository.organisation.get_centre_details(id).await
    }

    pub async fn create_centre(&self, input: CentreInput) -> AppResult<Centre> {
        if self
            .repository
            .organisation
            .centre_code_exists(&input.centre_code, None)
            .await?
        {
            return Err(AppError::Conflict("Centre code already exists".to_string()));
        }
        let centre = self.repository.organisation.create_centre(&input).await?;
        tracing::info!(centre_id = centre.id, code = %centre.centre_code, "Centre created");
        Ok(centre)
    }

    pub async fn update_centre(&self, id: i32, input: CentreInput) -> AppResult<Centre> {
        if self
            .repository
            .organisation
            .centre_code_exists(&input.centre_code, Some(id))
            .await?
        {
            return Err(AppError::Conflict("Centre code already exists".to_string()));
        }
        self.repository.organisation.update_centre(id, &input).await
    }

    pub async fn delete_centre(&self, id: i32) -> AppResult<()> {
        self.repository.organisation.delete_centre(id).await?;
        tracing::info!(centre_id = id, "Centre deleted");
        Ok(())
    }

    /// Schools of a centre. Librarians may only look at their own centre.
    pub async fn list_schools(
        &self,
        scope: CentreScope,
        centre_id: Option<i32>,
    ) -> AppResult<Vec<School>> {
        let centre_id = match (scope, centre_id) {
            (CentreScope::All, requested) => requested,
            (scope, Some(requested)) if scope.allows(Some(requested)) => Some(requested),
            (CentreScope::Only(own), None) => Some(own),
            _ => {
                return Err(AppError::Authorization(
                    "You can only view schools of your own centre".to_string(),
                ))
            }
        };
        self.repository.organisation.list_schools(centre_id).await
    }

    pub async fn create_school(&self, input: CreateSchool) -> AppResult<School> {
        self.repository.organisation.get_centre(input.centre_id).await?;
        let school = self.repository.organisation.create_school(&input).await?;
        tracing::info!(school_id = school.id, centre_id = school.centre_id, "School created");
        Ok(school)
    }

    pub async fn list_grades(&self) -> AppResult<Vec<Grade>> {
        self.repository.organisation.list_grades().await
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.organisation.list_categories().await
    }

    pub async fn list_subjects(&self, query: &SubjectQuery) -> AppResult<Vec<Subject>> {
        self.repository.organisation.list_subjects(query).await
    }

    pub async fn create_subject(&self, input: CreateSubject) -> AppResult<Subject> {
        if let Some(grade_id) = input.grade_id {
            if !self
                .repository
                .organisation
                .list_grades()
                .await?
                .iter()
                .any(|grade| grade.id == grade_id)
            {
                return Err(AppError::NotFound(format!("Grade with id {} not found", grade_id)));
            }
        }
        self.repository.organisation.create_subject(&input).await
    }

    /// Inserts the standard grades, categories and subjects that are missing.
    /// Running it again inserts nothing.
    pub async fn seed_reference_data(&self) -> AppResult<SeedReport> {
        let organisation = &self.repository.organisation;
        let mut report = SeedReport::default();

        for (name, order) in standard_grades() {
            report.grades += organisation.ensure_grade(&name, order).await?;
        }
        for name in CATEGORY_NAMES {
            report.categories += organisation.ensure_category(name).await?;
        }

        let grades: Vec<Grade> = organisation
            .list_grades()
            .await?
            .into_iter()
            .filter(|grade| grade.name != "Kindergarten")
            .collect();

        for (category_name, subjects) in GRADED_SUBJECTS {
            let category = organisation
                .find_category_by_name(category_name)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!("Category '{}' missing after seeding", category_name))
                })?;
            for grade in &grades {
                for subject in subjects {
                    report.subjects += organisation
                        .ensure_subject(subject, grade.id, category.id)
                        .await?;
                }
            }
        }

        tracing::info!(
            grades = report.grades,
            categories = report.categories,
            subjects = report.subjects,
            "Reference data seeded"
        );
        Ok(report)
    }
}
