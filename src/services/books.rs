//! Book management and CSV import

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDetails, BookQuery, BookShort, CreateBook, UpdateBook},
        user::{CentreScope, UserClaims},
        Page,
    },
    repository::{books::BookFilter, Repository},
};

use super::import::{self, ImportReport};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Staff see every book in their scope; borrowers only active books of
    /// their own centre.
    fn filter_for(claims: &UserClaims) -> BookFilter {
        BookFilter {
            centre_id: claims.scope().filter(),
            active_only: !claims.role.is_staff(),
        }
    }

    pub async fn search(
        &self,
        claims: &UserClaims,
        query: &BookQuery,
        page: Page,
    ) -> AppResult<(Vec<BookShort>, i64)> {
        self.repository
            .books
            .search(query, Self::filter_for(claims), page)
            .await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<BookDetails> {
        let book = self.repository.books.get_by_id(id).await?;

        let filter = Self::filter_for(claims);
        let visible = claims.scope().allows(book.centre_id) && (book.is_active || !filter.active_only);
        if !visible {
            return Err(AppError::NoSuchBook(id));
        }

        let shelf_number = self
            .repository
            .catalogue
            .shelf_for_book(book.id, book.centre_id)
            .await?;
        Ok(BookDetails {
            is_available: book.is_available(),
            shelf_number,
            book,
        })
    }

    /// The centre a new book belongs to: its school's centre, else the
    /// requested centre, else a librarian's own centre.
    async fn resolve_centre(
        &self,
        claims: &UserClaims,
        school_id: Option<i32>,
        centre_id: Option<i32>,
    ) -> AppResult<Option<i32>> {
        let centre_id = match school_id {
            Some(school_id) => Some(self.repository.organisation.get_school(school_id).await?.centre_id),
            None => match (centre_id, claims.scope()) {
                (Some(centre_id), _) => Some(centre_id),
                (None, CentreScope::Only(own)) => Some(own),
                (None, _) => None,
            },
        };
        claims.require_centre(centre_id)?;
        if let Some(centre_id) = centre_id {
            self.repository.organisation.get_centre(centre_id).await?;
        }
        Ok(centre_id)
    }

    async fn ensure_code_free(
        &self,
        code: &str,
        centre_id: Option<i32>,
        exclude_id: Option<i32>,
    ) -> AppResult<()> {
        if self
            .repository
            .books
            .code_exists(code.trim(), centre_id, exclude_id)
            .await?
        {
            return Err(AppError::Conflict(
                "Book code already exists in the centre".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create(&self, claims: &UserClaims, book: CreateBook) -> AppResult<Book> {
        let centre_id = self
            .resolve_centre(claims, book.school_id, book.centre_id)
            .await?;
        if let Some(subject_id) = book.subject_id {
            self.repository.organisation.get_subject(subject_id).await?;
        }
        self.ensure_code_free(&book.book_code, centre_id, None).await?;

        let created = self
            .repository
            .books
            .create(&book, centre_id, Some(claims.user_id))
            .await?;
        tracing::info!(
            book_id = created.id,
            generated = created.book_id.as_deref().unwrap_or("-"),
            ?centre_id,
            "Book created"
        );
        Ok(created)
    }

    pub async fn update(&self, claims: &UserClaims, id: i32, update: UpdateBook) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(id).await?;
        claims.require_centre(book.centre_id)?;

        if let Some(school_id) = update.school_id {
            let school = self.repository.organisation.get_school(school_id).await?;
            if book.centre_id.is_some() && book.centre_id != Some(school.centre_id) {
                return Err(AppError::BadRequest(
                    "The school belongs to another centre".to_string(),
                ));
            }
        }
        if let Some(ref code) = update.book_code {
            self.ensure_code_free(code, book.centre_id, Some(id)).await?;
        }
        if let Some(subject_id) = update.subject_id {
            self.repository.organisation.get_subject(subject_id).await?;
        }

        let updated = self.repository.books.update(id, &update).await?;
        tracing::info!(book_id = id, "Book updated");
        Ok(updated)
    }

    pub async fn delete(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        let book = self.repository.books.get_by_id(id).await?;
        claims.require_centre(book.centre_id)?;
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, title = %book.title, "Book deleted");
        Ok(())
    }

    /// Imports books from a CSV upload. Rows are saved one by one and a
    /// failing row does not stop the others.
    pub async fn import(
        &self,
        claims: &UserClaims,
        filename: &str,
        data: &[u8],
        centre_id: Option<i32>,
    ) -> AppResult<ImportReport> {
        import::ensure_csv(filename)?;
        let centre_id = self.resolve_centre(claims, None, centre_id).await?;
        let rows = import::parse_books(data)?;

        let categories = self.repository.organisation.list_categories().await?;
        let mut report = ImportReport::default();

        for row in rows {
            let (line, row) = match row {
                Ok(parsed) => parsed,
                Err(failure) => {
                    report.failed.push(failure);
                    continue;
                }
            };

            // Unknown categories are left empty
            let category_id = row.category.as_deref().and_then(|name| {
                categories
                    .iter()
                    .find(|category| category.name.eq_ignore_ascii_case(name))
                    .map(|category| category.id)
            });

            let book = CreateBook {
                title: row.title,
                author: row.author,
                book_code: row.book_code,
                publisher: row.publisher,
                year_of_publication: row.year_of_publication,
                total_copies: Some(row.total_copies),
                available_copies: Some(row.available_copies),
                category_id,
                centre_id,
                ..CreateBook::default()
            };

            let saved = match self.ensure_code_free(&book.book_code, centre_id, None).await {
                Ok(()) => {
                    self.repository
                        .books
                        .create(&book, centre_id, Some(claims.user_id))
                        .await
                }
                Err(e) => Err(e),
            };
            match saved {
                Ok(_) => report.created += 1,
                Err(e) => report.failed.push(crate::models::BulkFailure::new(line, row_error(&e))),
            }
        }

        tracing::info!(
            ?centre_id,
            created = report.created,
            failed = report.failed.len(),
            "Books imported"
        );
        Ok(report.finish("books"))
    }

    pub fn sample_csv(&self) -> &'static str {
        import::BOOKS_SAMPLE_CSV
    }
}

/// Client-facing reason for a failed import row
pub(crate) fn row_error(error: &AppError) -> String {
    match error {
        AppError::Conflict(msg)
        | AppError::BadRequest(msg)
        | AppError::Validation(msg)
        | AppError::NotFound(msg)
        | AppError::BusinessRule(_, msg) => msg.clone(),
        AppError::NoSuchUser(_) | AppError::NoSuchBook(_) => error.to_string(),
        _ => "Could not be saved".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use chrono::Utc;

    fn claims(role: Role, centre_id: Option<i32>) -> UserClaims {
        UserClaims {
            sub: "x@school.test".into(),
            user_id: 1,
            role,
            centre_id,
            exp: Utc::now().timestamp() + 60,
            iat: Utc::now().timestamp(),
        }
    }

    #[test]
    fn borrowers_see_active_books_of_their_centre() {
        let filter = BooksService::filter_for(&claims(Role::Student, Some(4)));
        assert_eq!(filter.centre_id, Some(4));
        assert!(filter.active_only);

        let filter = BooksService::filter_for(&claims(Role::Admin, None));
        assert_eq!(filter.centre_id, None);
        assert!(!filter.active_only);

        let filter = BooksService::filter_for(&claims(Role::Librarian, Some(2)));
        assert_eq!(filter.centre_id, Some(2));
        assert!(!filter.active_only);
    }

    #[test]
    fn row_errors_hide_internal_details() {
        assert_eq!(
            row_error(&AppError::Conflict("Book code already exists in the centre".into())),
            "Book code already exists in the centre"
        );
        assert_eq!(row_error(&AppError::Internal("boom".into())), "Could not be saved");
    }
}
