//! Borrow/return coordinator.
//!
//! Owns the pairing of a loan record with its inventory adjustment: a borrow
//! creates the loan and takes a copy, a return deletes the loan and puts the
//! copy back, each inside one transaction scope. Nothing here is retried; a
//! failed step rolls the whole scope back and the caller resubmits.

use chrono::{DateTime, Utc};

use super::store::{
    Directory, InventoryStore, LoanLedger, StoreError, StoreResult, TransactionScope,
};
use crate::{
    error::{AppError, AppResult},
    models::{Loan, LoanDetails, NewLoan, Page},
};

#[derive(Clone)]
pub struct BorrowCoordinator<S> {
    store: S,
}

impl<S> BorrowCoordinator<S>
where
    S: Directory + InventoryStore + LoanLedger,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lend one copy of `book_id` to `holder_id` until `due_date`
    pub async fn borrow(
        &self,
        holder_id: i32,
        book_id: i32,
        due_date: DateTime<Utc>,
    ) -> AppResult<Loan> {
        if !self.store.user_exists(holder_id).await.map_err(internal)? {
            return Err(AppError::UserNotFound);
        }

        if !self.store.book_exists(book_id).await.map_err(internal)? {
            return Err(AppError::BookNotFound);
        }

        match self.store.copies_available(book_id).await.map_err(internal)? {
            None => return Err(AppError::BookNotFound),
            Some(copies) if copies <= 0 => return Err(AppError::BookNotAvailable),
            Some(_) => {}
        }

        if self.store.find(holder_id, book_id).await.map_err(internal)?.is_some() {
            return Err(AppError::AlreadyBorrowed);
        }

        let new_loan = NewLoan {
            user_id: holder_id,
            book_id,
            due_date,
        };

        let mut scope = self.store.begin().await.map_err(internal)?;

        let outcome: StoreResult<(Loan, i32)> = async {
            let loan = self.store.create(&mut scope, &new_loan).await?;
            let remaining = self.store.decrement(&mut scope, book_id).await?;
            Ok((loan, remaining))
        }
        .await;

        match outcome {
            Ok((loan, remaining)) => {
                scope.commit().await.map_err(internal)?;
                tracing::info!(
                    loan_id = loan.id,
                    holder_id,
                    book_id,
                    remaining,
                    "Book borrowed"
                );
                Ok(loan)
            }
            Err(e) => {
                abandon(scope, &e, "borrow").await;
                Err(match e {
                    StoreError::NotFound => AppError::BookNotFound,
                    StoreError::NoCopiesAvailable => AppError::BookNotAvailable,
                    StoreError::Duplicate => AppError::AlreadyBorrowed,
                    other => internal(other),
                })
            }
        }
    }

    /// Take back the copy of `book_id` held by `holder_id`
    pub async fn return_book(&self, holder_id: i32, book_id: i32) -> AppResult<Loan> {
        let loan = self
            .store
            .find(holder_id, book_id)
            .await
            .map_err(internal)?
            .ok_or(AppError::BorrowNotFound)?;

        let mut scope = self.store.begin().await.map_err(internal)?;

        let outcome: StoreResult<Option<i32>> = async {
            self.store.delete(&mut scope, &loan).await?;
            self.store.increment(&mut scope, loan.book_id).await
        }
        .await;

        match outcome {
            Ok(restored) => {
                scope.commit().await.map_err(internal)?;
                match restored {
                    Some(copies) => tracing::info!(
                        loan_id = loan.id,
                        holder_id,
                        book_id,
                        copies,
                        "Book returned"
                    ),
                    None => tracing::debug!(
                        loan_id = loan.id,
                        holder_id,
                        book_id,
                        "Book returned after removal from catalog, inventory untouched"
                    ),
                }
                Ok(loan)
            }
            Err(e) => {
                abandon(scope, &e, "return").await;
                Err(match e {
                    // A concurrent return got there first
                    StoreError::NotFound => AppError::BorrowNotFound,
                    other => internal(other),
                })
            }
        }
    }

    pub async fn list_all(&self, page: Page) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.store.list_all(page).await.map_err(internal)
    }

    pub async fn list_by_holder(&self, holder_id: i32, page: Page) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.store.list_by_holder(holder_id, page).await.map_err(internal)
    }
}

/// Roll back after a failed step. A rollback failure is only logged; the
/// backend discards an uncommitted scope either way.
async fn abandon<T: TransactionScope>(scope: T, cause: &StoreError, operation: &str) {
    match cause {
        StoreError::Database(_) | StoreError::Backend(_) => {
            tracing::error!(operation, "Storage failure, rolling back: {}", cause)
        }
        _ => tracing::warn!(operation, "Rolling back: {}", cause),
    }

    if let Err(e) = scope.rollback().await {
        tracing::error!(operation, "Rollback failed: {}", e);
    }
}

fn internal(e: StoreError) -> AppError {
    AppError::Internal(e.to_string())
}
