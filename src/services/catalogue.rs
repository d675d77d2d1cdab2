//! Shelf locations of books within a centre

use crate::{
    error::{AppError, AppResult},
    models::{
        catalogue::{
            normalise_shelf, AddToCatalogue, CatalogueDetails, CatalogueEntry, CatalogueOutcome,
            CatalogueQuery, CatalogueResponse, UpdateCatalogue,
        },
        user::CentreScope,
        BookShort, Page, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogueService {
    repository: Repository,
}

impl CatalogueService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    async fn ensure_shelf_free(
        &self,
        shelf: &str,
        centre_id: Option<i32>,
        exclude_id: Option<i32>,
    ) -> AppResult<()> {
        if self
            .repository
            .catalogue
            .shelf_taken(shelf, centre_id, exclude_id)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Shelf '{}' is already in use in this centre",
                shelf
            )));
        }
        Ok(())
    }

    /// Places a book on a shelf. A book already catalogued in the centre is
    /// moved instead.
    pub async fn add(&self, claims: &UserClaims, request: AddToCatalogue) -> AppResult<CatalogueResponse> {
        let (book_id, shelf) = match (request.book_id, normalise_shelf(request.shelf_number.as_deref())) {
            (Some(book_id), Some(shelf)) => (book_id, shelf),
            _ => {
                return Err(AppError::BadRequest(
                    "Both book and shelf number are required".to_string(),
                ))
            }
        };

        let book = self.repository.books.get_by_id(book_id).await?;
        let centre_id = request.centre_id.or(book.centre_id);
        claims.require_centre(centre_id)?;

        let catalogue = &self.repository.catalogue;
        match catalogue.find_for_book(book.id, centre_id).await? {
            Some(existing) => {
                self.ensure_shelf_free(&shelf, centre_id, Some(existing.id)).await?;
                let entry = catalogue
                    .update(existing.id, &shelf, Some(request.notes.as_str()))
                    .await?;
                tracing::info!(entry_id = entry.id, book_id, shelf = %shelf, "Catalogue entry updated");
                Ok(CatalogueResponse {
                    outcome: CatalogueOutcome::Updated,
                    message: format!("'{}' moved to shelf {}", book.title, shelf),
                    entry,
                })
            }
            None => {
                self.ensure_shelf_free(&shelf, centre_id, None).await?;
                let entry = catalogue
                    .create(book.id, &shelf, centre_id, claims.user_id, &request.notes)
                    .await?;
                tracing::info!(entry_id = entry.id, book_id, shelf = %shelf, "Book catalogued");
                Ok(CatalogueResponse {
                    outcome: CatalogueOutcome::Created,
                    message: format!("'{}' added to shelf {}", book.title, shelf),
                    entry,
                })
            }
        }
    }

    pub async fn list(
        &self,
        claims: &UserClaims,
        query: &CatalogueQuery,
        page: Page,
    ) -> AppResult<(Vec<CatalogueDetails>, i64)> {
        let centre_id = match claims.scope() {
            CentreScope::All => query.centre_id,
            scope => scope.filter(),
        };
        self.repository
            .catalogue
            .search(query.search.as_deref(), centre_id, page)
            .await
    }

    pub async fn view(&self, claims: &UserClaims, id: i32) -> AppResult<CatalogueDetails> {
        let entry = self.repository.catalogue.get_details(id).await?;
        claims.require_centre(entry.centre_id)?;
        Ok(entry)
    }

    pub async fn update(
        &self,
        claims: &UserClaims,
        id: i32,
        update: UpdateCatalogue,
    ) -> AppResult<CatalogueEntry> {
        let entry = self.repository.catalogue.get_by_id(id).await?;
        claims.require_centre(entry.centre_id)?;

        let shelf = normalise_shelf(Some(&update.shelf_number))
            .ok_or_else(|| AppError::BadRequest("Shelf number is required".to_string()))?;
        self.ensure_shelf_free(&shelf, entry.centre_id, Some(id)).await?;

        self.repository
            .catalogue
            .update(id, &shelf, update.notes.as_deref())
            .await
    }

    pub async fn delete(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        let entry = self.repository.catalogue.get_by_id(id).await?;
        claims.require_centre(entry.centre_id)?;
        self.repository.catalogue.delete(id).await?;
        tracing::info!(entry_id = id, book_id = entry.book_id, "Catalogue entry removed");
        Ok(())
    }

    /// Active books of a centre that have no shelf yet
    pub async fn books_by_centre(
        &self,
        claims: &UserClaims,
        centre_id: Option<i32>,
    ) -> AppResult<Vec<BookShort>> {
        let centre_id =
            centre_id.ok_or_else(|| AppError::BadRequest("centre_id is required".to_string()))?;
        claims.require_centre(Some(centre_id))?;
        self.repository.books.uncatalogued(centre_id).await
    }
}
