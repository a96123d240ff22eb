//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod users;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    borrowing::{
        Directory, InventoryStore, LoanLedger, StoreResult, TransactionScope, Transactional,
    },
    models::{Loan, LoanDetails, NewLoan, Page},
};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQLSTATE 23505
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// A PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PgScope {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionScope for PgScope {
    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Transactional for Repository {
    type Scope = PgScope;

    async fn begin(&self) -> StoreResult<PgScope> {
        Ok(PgScope {
            tx: self.pool.begin().await?,
        })
    }
}

#[async_trait]
impl Directory for Repository {
    async fn book_exists(&self, book_id: i32) -> StoreResult<bool> {
        self.books.exists(book_id).await
    }

    async fn copies_available(&self, book_id: i32) -> StoreResult<Option<i32>> {
        self.books.copies_available(book_id).await
    }

    async fn user_exists(&self, user_id: i32) -> StoreResult<bool> {
        self.users.exists(user_id).await
    }
}

#[async_trait]
impl InventoryStore for Repository {
    async fn decrement(&self, scope: &mut PgScope, book_id: i32) -> StoreResult<i32> {
        self.books.decrement(&mut scope.tx, book_id).await
    }

    async fn increment(&self, scope: &mut PgScope, book_id: i32) -> StoreResult<Option<i32>> {
        self.books.increment(&mut scope.tx, book_id).await
    }
}

#[async_trait]
impl LoanLedger for Repository {
    async fn create(&self, scope: &mut PgScope, loan: &NewLoan) -> StoreResult<Loan> {
        self.loans.create(&mut scope.tx, loan).await
    }

    async fn find(&self, holder_id: i32, book_id: i32) -> StoreResult<Option<Loan>> {
        self.loans.find(holder_id, book_id).await
    }

    async fn delete(&self, scope: &mut PgScope, loan: &Loan) -> StoreResult<()> {
        self.loans.delete(&mut scope.tx, loan).await
    }

    async fn list_by_holder(&self, holder_id: i32, page: Page) -> StoreResult<(Vec<LoanDetails>, i64)> {
        self.loans.list(Some(holder_id), page).await
    }

    async fn list_all(&self, page: Page) -> StoreResult<(Vec<LoanDetails>, i64)> {
        self.loans.list(None, page).await
    }
}
