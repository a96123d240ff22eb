//! Borrow/return service: request validation in front of the coordinator

use chrono::Utc;

use crate::{
    borrowing::{BorrowCoordinator, Directory, InventoryStore, LoanLedger},
    error::AppResult,
    models::{
        loan::{BorrowRequest, Loan, LoanDetails, ReturnRequest},
        Paginated, PageQuery,
    },
    repository::Repository,
    services::validation::RequestValidator,
};

#[derive(Clone)]
pub struct BorrowsService<S = Repository> {
    coordinator: BorrowCoordinator<S>,
    validator: RequestValidator,
}

impl<S> BorrowsService<S>
where
    S: Directory + InventoryStore + LoanLedger,
{
    pub fn new(coordinator: BorrowCoordinator<S>, validator: RequestValidator) -> Self {
        Self {
            coordinator,
            validator,
        }
    }

    /// Borrow a book on behalf of an authenticated holder
    pub async fn borrow(&self, holder_id: i32, request: &BorrowRequest) -> AppResult<Loan> {
        self.validator.validate(request)?;
        self.validator.due_date(request.due_date, Utc::now())?;

        self.coordinator
            .borrow(holder_id, request.book_id, request.due_date)
            .await
    }

    /// Return a book held by an authenticated holder
    pub async fn return_book(&self, holder_id: i32, request: &ReturnRequest) -> AppResult<Loan> {
        self.validator.validate(request)?;
        self.coordinator.return_book(holder_id, request.book_id).await
    }

    /// Every active loan
    pub async fn list_all(&self, query: &PageQuery) -> AppResult<Paginated<LoanDetails>> {
        let page = self.validator.page(query)?;
        let (loans, total) = self.coordinator.list_all(page).await?;
        Ok(Paginated::new(loans, total, page))
    }

    /// Active loans of one holder
    pub async fn list_for_holder(&self, holder_id: i32, query: &PageQuery) -> AppResult<Paginated<LoanDetails>> {
        let page = self.validator.page(query)?;
        let (loans, total) = self.coordinator.list_by_holder(holder_id, page).await?;
        Ok(Paginated::new(loans, total, page))
    }
}
