//! Borrow workflow: requests, issue, returns and renewals

use chrono::{Duration, Utc};

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult, ErrorCode},
    models::{
        book::{BookQuery, BookShort},
        borrow::{
            borrow_limit_reached, can_borrow, due_date, ActiveBorrowListing, ActiveBorrowQuery,
            BorrowHistoryQuery, BorrowRequestResponse, BulkBookReport, MyBorrows, RequestBorrow,
            RequestOutcome, TeacherBookQuery,
        },
        notification::{messages, teacher_bulk_group_id, NewNotification},
        Book, Borrow, BorrowDetails, BorrowStatus, BulkFailure, BulkReport, NotificationType,
        Page, Role, User, UserClaims, UserWithCount,
    },
    repository::{books::BookFilter, Repository},
};

use super::{notifications::NotificationsService, reservations::ReservationsService, scoped_user};

/// Returned borrows shown in "my borrows"
const RECENT_RETURNS: i64 = 20;

const DEFAULT_REJECT_REASON: &str = "No reason provided";
const BULK_REJECT_REASON: &str = "Contact librarian for details.";

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    rules: CirculationConfig,
    notifications: NotificationsService,
    reservations: ReservationsService,
}

impl CirculationService {
    pub fn new(
        repository: Repository,
        rules: CirculationConfig,
        notifications: NotificationsService,
        reservations: ReservationsService,
    ) -> Self {
        Self {
            repository,
            rules,
            notifications,
            reservations,
        }
    }

    // ---- borrower side ----

    async fn ensure_can_borrow(&self, user: &User) -> AppResult<Option<i64>> {
        let limit = self.rules.borrow_limit(user.role);
        let active = self.repository.borrows.count_active(user.id).await?;
        match limit {
            Some(limit) if !can_borrow(Some(limit), active) => Err(borrow_limit_reached(limit)),
            _ => Ok(limit),
        }
    }

    async fn ensure_not_borrowing(&self, user_id: i32, book: &Book) -> AppResult<()> {
        if self
            .repository
            .borrows
            .has_active_for_book(user_id, book.id)
            .await?
        {
            return Err(AppError::rule(
                ErrorCode::Duplicate,
                format!("You already have an active borrow for '{}'", book.title),
            ));
        }
        Ok(())
    }

    /// Creates the `requested` borrow in the book's centre, fulfils the
    /// user's own reservation of the book if any.
    async fn create_request(
        &self,
        user: &User,
        book: &Book,
        notes: &str,
        limit: Option<i64>,
    ) -> AppResult<Borrow> {
        let borrow = self
            .repository
            .borrows
            .create_request(book.id, user.id, book.centre_id, notes, limit)
            .await?;
        tracing::info!(
            borrow_id = borrow.id,
            book_id = book.id,
            user_id = user.id,
            "Borrow requested"
        );

        if let Some(reservation) = self.repository.reservations.fulfil(user.id, book.id).await? {
            tracing::info!(reservation_id = reservation.id, "Reservation fulfilled");
        }
        Ok(borrow)
    }

    /// Requests a borrow, or reserves the book when no copy is available
    pub async fn request_borrow(
        &self,
        claims: &UserClaims,
        request: RequestBorrow,
    ) -> AppResult<BorrowRequestResponse> {
        claims.require_borrower()?;
        let book = self.reservations.visible_book(claims, request.book_id).await?;
        let user = self.repository.users.get_by_id(claims.user_id).await?;

        let limit = self.ensure_can_borrow(&user).await?;
        self.ensure_not_borrowing(user.id, &book).await?;

        if !book.is_available() {
            let reservation = self.reservations.place(&user, &book, book.centre_id).await?;
            return Ok(BorrowRequestResponse {
                outcome: RequestOutcome::Reserved,
                message: format!(
                    "'{}' is not available. It has been reserved for you instead.",
                    book.title
                ),
                borrow: None,
                reservation: Some(reservation),
            });
        }

        let borrow = self
            .create_request(
                &user,
                &book,
                request.notes.as_deref().unwrap_or_default(),
                limit,
            )
            .await?;

        self.notifications
            .notify_librarians(
                book.centre_id,
                NewNotification::new(
                    0,
                    NotificationType::BorrowRequest,
                    messages::borrow_requested(&user.full_name(), &book.title),
                )
                .book(book.id)
                .borrow(borrow.id),
            )
            .await;

        Ok(BorrowRequestResponse {
            outcome: RequestOutcome::Requested,
            message: format!("Borrow request for '{}' submitted", book.title),
            borrow: Some(borrow),
            reservation: None,
        })
    }

    pub async fn my_borrows(&self, claims: &UserClaims) -> AppResult<MyBorrows> {
        let borrows = &self.repository.borrows;
        let active = borrows
            .for_user(claims.user_id, &[BorrowStatus::Requested, BorrowStatus::Issued], None)
            .await?;
        let returned = borrows
            .for_user(claims.user_id, &[BorrowStatus::Returned], Some(RECENT_RETURNS))
            .await?;
        let reservations = self
            .repository
            .reservations
            .pending_for_user(claims.user_id)
            .await?;

        let borrow_limit = self.rules.borrow_limit(claims.role);
        Ok(MyBorrows {
            can_borrow_more: claims.role.is_borrower()
                && can_borrow(borrow_limit, active.len() as i64),
            active,
            returned,
            reservations,
            borrow_limit,
        })
    }

    /// The caller's own borrow; other users' borrows are reported as missing
    async fn own_borrow(&self, claims: &UserClaims, id: i32) -> AppResult<Borrow> {
        let borrow = self.repository.borrows.get_by_id(id).await?;
        if borrow.user_id != claims.user_id {
            return Err(AppError::NotFound(format!("Borrow with id {} not found", id)));
        }
        Ok(borrow)
    }

    /// Withdraws a request that was not issued yet
    pub async fn cancel(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        let borrow = self.own_borrow(claims, id).await?;
        let only_pending = "Only pending requests can be cancelled";
        borrow.status.expect(BorrowStatus::Requested, only_pending)?;
        if !self.repository.borrows.delete_requested(id).await? {
            return Err(AppError::rule(ErrorCode::InvalidStatus, only_pending));
        }
        tracing::info!(borrow_id = id, user_id = claims.user_id, "Borrow request cancelled");
        Ok(())
    }

    pub async fn renew(&self, claims: &UserClaims, id: i32) -> AppResult<Borrow> {
        let borrow = self.own_borrow(claims, id).await?;
        borrow
            .status
            .expect(BorrowStatus::Issued, "You can only renew issued books.")?;

        let max_reached = || {
            AppError::rule(
                ErrorCode::MaxRenewalsReached,
                format!("Maximum renewals reached ({})", self.rules.max_renewals),
            )
        };
        if borrow.renewals >= self.rules.max_renewals {
            return Err(max_reached());
        }

        let new_due =
            borrow.due_date.unwrap_or_else(Utc::now) + Duration::days(self.rules.renewal_days);
        let renewed = self
            .repository
            .borrows
            .renew(id, self.rules.max_renewals, new_due)
            .await?
            .ok_or_else(max_reached)?;

        let book = self.repository.books.get_by_id(renewed.book_id).await?;
        tracing::info!(
            borrow_id = id,
            renewals = renewed.renewals,
            due = %new_due,
            "Borrow renewed"
        );
        self.notifications
            .send(
                NewNotification::new(
                    renewed.user_id,
                    NotificationType::BorrowRenewed,
                    messages::renewed(&book.title, new_due),
                )
                .book(book.id)
                .borrow(id),
            )
            .await;
        Ok(renewed)
    }

    /// Books of the teacher's centre
    pub async fn teacher_books(
        &self,
        claims: &UserClaims,
        query: TeacherBookQuery,
        page: Page,
    ) -> AppResult<(Vec<BookShort>, i64)> {
        claims.require_teacher()?;
        let book_query = BookQuery {
            q: query.q,
            category_id: query.category_id,
            available_only: query.available_only,
            ..BookQuery::default()
        };
        self.repository
            .books
            .search(
                &book_query,
                BookFilter {
                    centre_id: claims.scope().filter(),
                    active_only: true,
                },
                page,
            )
            .await
    }

    /// Books of `ids` in the caller's centre, in request order; the others
    /// are added to `failed`
    async fn books_in_centre(
        &self,
        claims: &UserClaims,
        ids: &[i32],
        failed: &mut Vec<BulkFailure>,
    ) -> AppResult<Vec<Book>> {
        let books = self.repository.books.get_many(ids).await?;
        let mut found = Vec::with_capacity(books.len());
        for &id in ids {
            match books.iter().find(|book| book.id == id) {
                Some(book) if book.is_active && claims.scope().allows(book.centre_id) => {
                    found.push(book.clone())
                }
                Some(_) => failed.push(BulkFailure::new(id, "Not in your centre")),
                None => failed.push(BulkFailure::new(id, "Book not found")),
            }
        }
        Ok(found)
    }

    /// Teacher requests several books at once. Librarians get one grouped
    /// notification per day.
    pub async fn bulk_borrow_request(
        &self,
        claims: &UserClaims,
        book_ids: &[i32],
    ) -> AppResult<BulkBookReport> {
        claims.require_teacher()?;
        let teacher = self.repository.users.get_by_id(claims.user_id).await?;

        let mut failed = Vec::new();
        let mut processed = Vec::new();
        let mut titles = Vec::new();

        for book in self.books_in_centre(claims, book_ids, &mut failed).await? {
            if self
                .repository
                .borrows
                .has_active_for_book(teacher.id, book.id)
                .await?
            {
                failed.push(BulkFailure::new(book.id, "Already requested or borrowed"));
                continue;
            }
            if !book.is_available() {
                failed.push(BulkFailure::new(book.id, "Not available"));
                continue;
            }
            // Bulk teacher requests are not limited
            match self.create_request(&teacher, &book, "", None).await {
                Ok(_) => {
                    processed.push(book.id);
                    titles.push(book.title);
                }
                Err(e) => failed.push(BulkFailure::new(book.id, super::books::row_error(&e))),
            }
        }

        if !titles.is_empty() {
            let group = teacher_bulk_group_id(teacher.id, Utc::now().date_naive());
            self.notifications
                .notify_librarians(
                    teacher.centre_id,
                    NewNotification::new(
                        0,
                        NotificationType::TeacherBulkRequest,
                        messages::teacher_bulk_request(&teacher.full_name(), &titles),
                    )
                    .group(group),
                )
                .await;
        }

        tracing::info!(
            user_id = teacher.id,
            requested = processed.len(),
            failed = failed.len(),
            "Bulk borrow request"
        );
        Ok(BulkBookReport {
            message: format!(
                "Requested {} book(s); {} could not be requested",
                processed.len(),
                failed.len()
            ),
            processed,
            failed,
        })
    }

    /// Teacher reserves several unavailable books at once
    pub async fn bulk_reserve(&self, claims: &UserClaims, book_ids: &[i32]) -> AppResult<BulkBookReport> {
        claims.require_teacher()?;
        let teacher = self.repository.users.get_by_id(claims.user_id).await?;

        let mut failed = Vec::new();
        let mut processed = Vec::new();

        for book in self.books_in_centre(claims, book_ids, &mut failed).await? {
            if book.is_available() {
                failed.push(BulkFailure::new(book.id, "Available - borrow instead"));
                continue;
            }
            match self.reservations.place(&teacher, &book, teacher.centre_id).await {
                Ok(_) => processed.push(book.id),
                Err(AppError::Conflict(_)) => {
                    failed.push(BulkFailure::new(book.id, "Already reserved"))
                }
                Err(e) => return Err(e),
            }
        }

        Ok(BulkBookReport {
            message: format!(
                "Reserved {} book(s); {} could not be reserved",
                processed.len(),
                failed.len()
            ),
            processed,
            failed,
        })
    }

    // ---- staff side ----

    pub async fn pending_requests(
        &self,
        claims: &UserClaims,
        search: Option<&str>,
        page: Page,
    ) -> AppResult<(Vec<UserWithCount>, i64)> {
        self.repository
            .borrows
            .pending_users(search, claims.scope().filter(), page)
            .await
    }

    pub async fn user_pending_requests(
        &self,
        claims: &UserClaims,
        user_id: i32,
    ) -> AppResult<Vec<BorrowDetails>> {
        scoped_user(&self.repository, claims, user_id).await?;
        self.repository
            .borrows
            .requested_for_user(user_id, claims.scope().filter())
            .await
    }

    /// A borrow within the caller's centre
    async fn scoped_borrow(&self, claims: &UserClaims, id: i32) -> AppResult<Borrow> {
        let borrow = self.repository.borrows.get_by_id(id).await?;
        claims.require_centre(borrow.centre_id)?;
        Ok(borrow)
    }

    pub async fn issue(&self, claims: &UserClaims, id: i32, days: Option<i64>) -> AppResult<Borrow> {
        self.scoped_borrow(claims, id).await?;
        let now = Utc::now();
        let due = due_date(
            now,
            days.unwrap_or(self.rules.default_loan_days),
            self.rules.max_loan_days,
        )?;
        self.issue_unchecked(claims, id, now, due).await
    }

    async fn issue_unchecked(
        &self,
        claims: &UserClaims,
        id: i32,
        now: chrono::DateTime<Utc>,
        due: chrono::DateTime<Utc>,
    ) -> AppResult<Borrow> {
        let (borrow, book) = self
            .repository
            .borrows
            .issue(id, claims.user_id, now, due)
            .await?;
        tracing::info!(
            borrow_id = id,
            book_id = book.id,
            issued_by = claims.user_id,
            due = %due,
            available = book.available_copies,
            "Borrow issued"
        );

        self.notifications
            .send(
                NewNotification::new(
                    borrow.user_id,
                    NotificationType::BookIssued,
                    messages::issued(&book.title, due),
                )
                .book(book.id)
                .borrow(borrow.id),
            )
            .await;
        Ok(borrow)
    }

    pub async fn reject(&self, claims: &UserClaims, id: i32, reason: Option<&str>) -> AppResult<()> {
        let borrow = self.scoped_borrow(claims, id).await?;
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECT_REASON);
        self.reject_unchecked(claims, &borrow, reason).await
    }

    async fn reject_unchecked(&self, claims: &UserClaims, borrow: &Borrow, reason: &str) -> AppResult<()> {
        let processed = "This request has already been processed";
        borrow.status.expect(BorrowStatus::Requested, processed)?;
        if !self.repository.borrows.delete_requested(borrow.id).await? {
            return Err(AppError::rule(ErrorCode::InvalidStatus, processed));
        }
        let book = self.repository.books.get_by_id(borrow.book_id).await?;
        tracing::info!(
            borrow_id = borrow.id,
            rejected_by = claims.user_id,
            reason,
            "Borrow rejected"
        );

        self.notifications
            .send(
                NewNotification::new(
                    borrow.user_id,
                    NotificationType::BorrowRejected,
                    messages::rejected(&book.title, reason),
                )
                .book(book.id),
            )
            .await;
        Ok(())
    }

    /// Borrows of `ids` that are the given user's, within the caller's centre
    async fn user_borrows(
        &self,
        claims: &UserClaims,
        user_id: i32,
        ids: &[i32],
        report: &mut BulkReport,
    ) -> AppResult<Vec<Borrow>> {
        let mut borrows = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.repository.borrows.get_by_id(id).await {
                Ok(borrow) if borrow.user_id == user_id && claims.scope().allows(borrow.centre_id) => {
                    borrows.push(borrow)
                }
                Ok(_) => report.fail(id, "Request not found"),
                Err(e) if e.is_not_found() => report.fail(id, "Request not found"),
                Err(e) => return Err(e),
            }
        }
        Ok(borrows)
    }

    pub async fn bulk_issue(
        &self,
        claims: &UserClaims,
        user_id: i32,
        ids: &[i32],
        days: Option<i64>,
    ) -> AppResult<BulkReport> {
        let now = Utc::now();
        let due = due_date(
            now,
            days.unwrap_or(self.rules.default_loan_days),
            self.rules.max_loan_days,
        )?;

        let mut report = BulkReport::default();
        for borrow in self.user_borrows(claims, user_id, ids, &mut report).await? {
            match self.issue_unchecked(claims, borrow.id, now, due).await {
                Ok(_) => report.processed += 1,
                Err(e) if e.is_not_found() || matches!(e, AppError::BusinessRule(..)) => {
                    report.fail(borrow.id, super::books::row_error(&e))
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(user_id, issued = report.processed, failed = report.failed.len(), "Bulk issue");
        Ok(report.finish("issued"))
    }

    pub async fn bulk_reject(
        &self,
        claims: &UserClaims,
        user_id: i32,
        ids: &[i32],
        reason: Option<&str>,
    ) -> AppResult<BulkReport> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(BULK_REJECT_REASON);

        let mut report = BulkReport::default();
        for borrow in self.user_borrows(claims, user_id, ids, &mut report).await? {
            match self.reject_unchecked(claims, &borrow, reason).await {
                Ok(()) => report.processed += 1,
                Err(e @ AppError::BusinessRule(..)) => {
                    report.fail(borrow.id, super::books::row_error(&e))
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(user_id, rejected = report.processed, failed = report.failed.len(), "Bulk reject");
        Ok(report.finish("rejected"))
    }

    /// Students: flat list by due date. Teachers: grouped by teacher.
    pub async fn active_borrows(
        &self,
        claims: &UserClaims,
        query: &ActiveBorrowQuery,
        page: Page,
    ) -> AppResult<(ActiveBorrowListing, i64)> {
        let role = query.user_type.role();
        let search = query.search.as_deref();
        let centre = claims.scope().filter();
        let borrows = &self.repository.borrows;

        if role == Role::Teacher {
            let (users, total) = borrows
                .active_users(role, search, query.overdue_only(), centre, page)
                .await?;
            Ok((ActiveBorrowListing::Users(users), total))
        } else {
            let (list, total) = borrows
                .active_list(role, search, query.overdue_only(), centre, page)
                .await?;
            Ok((ActiveBorrowListing::Borrows(list), total))
        }
    }

    pub async fn user_active_borrows(
        &self,
        claims: &UserClaims,
        user_id: i32,
    ) -> AppResult<Vec<BorrowDetails>> {
        scoped_user(&self.repository, claims, user_id).await?;
        self.repository.borrows.issued_to(user_id).await
    }

    pub async fn user_history(
        &self,
        claims: &UserClaims,
        user_id: i32,
    ) -> AppResult<Vec<BorrowDetails>> {
        scoped_user(&self.repository, claims, user_id).await?;
        self.repository
            .borrows
            .for_user(
                user_id,
                &[BorrowStatus::Requested, BorrowStatus::Issued, BorrowStatus::Returned],
                None,
            )
            .await
    }

    /// Receives a book back and tells whoever reserved it first
    pub async fn receive_return(&self, claims: &UserClaims, id: i32) -> AppResult<Borrow> {
        self.scoped_borrow(claims, id).await?;
        let outcome = self
            .repository
            .borrows
            .receive_return(id, claims.user_id, Utc::now())
            .await?;
        let book = &outcome.book;
        tracing::info!(
            borrow_id = id,
            book_id = book.id,
            returned_to = claims.user_id,
            available = book.available_copies,
            "Borrow returned"
        );

        self.notifications
            .send(
                NewNotification::new(
                    outcome.borrow.user_id,
                    NotificationType::BookReturned,
                    messages::returned(&book.title),
                )
                .book(book.id)
                .borrow(id),
            )
            .await;

        if let Some(reservation) = outcome.notified_reservation {
            self.notifications
                .announce_available(book, &reservation, self.rules.reservation_hold_days)
                .await;
        }

        Ok(outcome.borrow)
    }

    pub async fn borrow_history(
        &self,
        claims: &UserClaims,
        query: &BorrowHistoryQuery,
        page: Page,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        self.repository
            .borrows
            .history(
                query.user_type.role(),
                query.search.as_deref(),
                query.status,
                claims.scope().filter(),
                page,
            )
            .await
    }
}
