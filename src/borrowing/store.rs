//! Storage contracts for the borrow/return flow.
//!
//! A backend implements [`Transactional`] to hand out a [`TransactionScope`],
//! and the ledger and inventory operations take that scope explicitly. The
//! scope is consumed by `commit` or `rollback`; dropping it without either
//! discards every change made through it.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Loan, LoanDetails, NewLoan, Page};

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("no copies available")]
    NoCopiesAvailable,

    #[error("duplicate record")]
    Duplicate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An open unit of work. Changes become visible only after `commit`.
#[async_trait]
pub trait TransactionScope: Send + Sized {
    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

#[async_trait]
pub trait Transactional: Send + Sync {
    type Scope: TransactionScope;

    async fn begin(&self) -> StoreResult<Self::Scope>;
}

/// Existence lookups served by the catalog and identity collaborators
#[async_trait]
pub trait Directory: Send + Sync {
    async fn book_exists(&self, book_id: i32) -> StoreResult<bool>;

    /// Current copy count, `None` when the book does not exist
    async fn copies_available(&self, book_id: i32) -> StoreResult<Option<i32>>;

    async fn user_exists(&self, user_id: i32) -> StoreResult<bool>;
}

/// Per-book available-copy counts
#[async_trait]
pub trait InventoryStore: Transactional {
    /// Take one copy. Fails with `NotFound` for an unknown book and with
    /// `NoCopiesAvailable` when the count is already zero. Concurrent callers
    /// on the same book are serialized by the backend. Returns the new count.
    async fn decrement(&self, scope: &mut Self::Scope, book_id: i32) -> StoreResult<i32>;

    /// Put one copy back. A book that no longer exists is left alone and
    /// reported as `None`.
    async fn increment(&self, scope: &mut Self::Scope, book_id: i32) -> StoreResult<Option<i32>>;
}

/// Active loan records
#[async_trait]
pub trait LoanLedger: Transactional {
    /// Insert a loan. `Duplicate` if the holder already has this book.
    async fn create(&self, scope: &mut Self::Scope, loan: &NewLoan) -> StoreResult<Loan>;

    async fn find(&self, holder_id: i32, book_id: i32) -> StoreResult<Option<Loan>>;

    /// Remove a loan. `NotFound` if it was already removed.
    async fn delete(&self, scope: &mut Self::Scope, loan: &Loan) -> StoreResult<()>;

    /// Newest first, with the total row count
    async fn list_by_holder(&self, holder_id: i32, page: Page) -> StoreResult<(Vec<LoanDetails>, i64)>;

    /// Newest first, with the total row count
    async fn list_all(&self, page: Page) -> StoreResult<(Vec<LoanDetails>, i64)>;
}
