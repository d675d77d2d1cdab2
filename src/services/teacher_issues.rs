//! Teacher sub-lending of borrowed books to students

use chrono::Utc;

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        teacher_issue::{
            expected_return, IssueToStudent, ManagedBook, TeacherBook, TeacherIssueDetails,
            TeacherIssueQuery, TeacherIssueStatus, UpdateTeacherIssue,
        },
        Borrow, BorrowStatus, Page, TeacherBookIssue, UserClaims,
    },
    repository::{teacher_issues::NewTeacherIssue, Repository},
};

#[derive(Clone)]
pub struct TeacherIssuesService {
    repository: Repository,
    default_days: i64,
}

impl TeacherIssuesService {
    pub fn new(repository: Repository, default_days: i64) -> Self {
        Self {
            repository,
            default_days,
        }
    }

    /// The teacher's own issued borrow; anything else is reported as missing
    async fn parent_borrow(&self, claims: &UserClaims, borrow_id: i32) -> AppResult<Borrow> {
        claims.require_teacher()?;
        let borrow = self.repository.borrows.get_by_id(borrow_id).await?;
        if borrow.user_id != claims.user_id || borrow.status != BorrowStatus::Issued {
            return Err(AppError::NotFound(format!(
                "Borrow with id {} not found",
                borrow_id
            )));
        }
        Ok(borrow)
    }

    pub async fn my_books(&self, claims: &UserClaims) -> AppResult<Vec<TeacherBook>> {
        claims.require_teacher()?;
        let borrows = self.repository.borrows.issued_to(claims.user_id).await?;
        let counts = self
            .repository
            .teacher_issues
            .active_counts(claims.user_id)
            .await?;

        Ok(borrows
            .into_iter()
            .map(|borrow| TeacherBook {
                issued_count: counts.get(&borrow.id).copied().unwrap_or(0),
                borrow,
            })
            .collect())
    }

    pub async fn issue_to_student(
        &self,
        claims: &UserClaims,
        borrow_id: i32,
        request: IssueToStudent,
    ) -> AppResult<TeacherBookIssue> {
        let borrow = self.parent_borrow(claims, borrow_id).await?;
        let now = Utc::now();

        let issue = self
            .repository
            .teacher_issues
            .create(&NewTeacherIssue {
                parent_borrow_id: borrow.id,
                teacher_id: claims.user_id,
                book_id: borrow.book_id,
                student_name: request.student_name,
                student_id: request.student_id,
                issue_date: now,
                expected_return_date: expected_return(
                    now,
                    request.expected_days.unwrap_or(self.default_days),
                ),
                notes: request.notes,
            })
            .await?;
        tracing::info!(
            issue_id = issue.id,
            borrow_id,
            teacher_id = claims.user_id,
            student = %issue.student_name,
            "Book issued to student"
        );
        Ok(issue)
    }

    pub async fn manage_book(&self, claims: &UserClaims, borrow_id: i32) -> AppResult<ManagedBook> {
        self.parent_borrow(claims, borrow_id).await?;
        let borrow = self.repository.borrows.get_details(borrow_id).await?;
        let (active, returned): (Vec<TeacherIssueDetails>, Vec<TeacherIssueDetails>) = self
            .repository
            .teacher_issues
            .for_borrow(borrow_id)
            .await?
            .into_iter()
            .partition(|issue| issue.status == TeacherIssueStatus::Issued);

        Ok(ManagedBook {
            borrow,
            active,
            returned,
        })
    }

    pub async fn receive_return(&self, claims: &UserClaims, issue_id: i32) -> AppResult<TeacherBookIssue> {
        claims.require_teacher()?;
        self.repository
            .teacher_issues
            .get_for_teacher(issue_id, claims.user_id)
            .await?;

        let issue = self
            .repository
            .teacher_issues
            .mark_returned(issue_id, Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::rule(ErrorCode::InvalidStatus, "This book has already been returned")
            })?;
        tracing::info!(issue_id, teacher_id = claims.user_id, "Sub-loan returned");
        Ok(issue)
    }

    pub async fn all_issues(
        &self,
        claims: &UserClaims,
        query: &TeacherIssueQuery,
        page: Page,
    ) -> AppResult<(Vec<TeacherIssueDetails>, i64)> {
        claims.require_teacher()?;
        self.repository
            .teacher_issues
            .search(claims.user_id, query, page)
            .await
    }

    pub async fn update_issue(
        &self,
        claims: &UserClaims,
        issue_id: i32,
        update: UpdateTeacherIssue,
    ) -> AppResult<TeacherBookIssue> {
        claims.require_teacher()?;
        let issue = self
            .repository
            .teacher_issues
            .get_for_teacher(issue_id, claims.user_id)
            .await?;

        let expected = update
            .expected_days
            .map(|days| expected_return(issue.issue_date, days));
        self.repository
            .teacher_issues
            .update(
                issue_id,
                update.student_name.as_deref(),
                update.student_id.as_deref(),
                update.notes.as_deref(),
                expected,
            )
            .await
    }
}
