//! Books repository: catalog records and the per-book copy count

use sqlx::{PgConnection, Pool, Postgres};

use super::is_unique_violation;
use crate::{
    borrowing::{StoreError, StoreResult},
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook},
        Page,
    },
};

const BOOK_COLUMNS: &str =
    "id, title, author, isbn, copies_available, published_at, created_at, updated_at";

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1 AND deleted_at IS NULL",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::BookNotFound)
    }

    /// List books, newest first
    pub async fn list(&self, page: Page) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            r#"
            SELECT {} FROM books
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
            BOOK_COLUMNS
        ))
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Check if an ISBN is already used by a live book
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM books
                WHERE isbn = $1 AND deleted_at IS NULL AND ($2::INT IS NULL OR id != $2)
            )
            "#,
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, isbn, copies_available, published_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.copies_available)
        .bind(book.published_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("isbn is already registered".to_string())
            } else {
                e.into()
            }
        })
    }

    /// Update bibliographic fields. `copies_available` is never written here.
    pub async fn update(&self, book: &Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $1, author = $2, isbn = $3, published_at = $4, updated_at = NOW()
            WHERE id = $5 AND deleted_at IS NULL
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.published_at)
        .bind(book.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("isbn is already registered".to_string())
            } else {
                e.into()
            }
        })?
        .ok_or(AppError::BookNotFound)
    }

    /// Remove a book from the catalog. The row is kept so that open loans
    /// can still be returned.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BookNotFound);
        }
        Ok(())
    }

    pub async fn exists(&self, id: i32) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn copies_available(&self, id: i32) -> StoreResult<Option<i32>> {
        let copies: Option<i32> = sqlx::query_scalar(
            "SELECT copies_available FROM books WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(copies)
    }

    /// Take one copy inside the caller's transaction.
    ///
    /// The conditional UPDATE row-locks the book until the transaction ends,
    /// so a concurrent decrement waits and then re-checks the floor.
    pub async fn decrement(&self, conn: &mut PgConnection, id: i32) -> StoreResult<i32> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET copies_available = copies_available - 1, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL AND copies_available > 0
            RETURNING copies_available
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(remaining);
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

        Err(if exists {
            StoreError::NoCopiesAvailable
        } else {
            StoreError::NotFound
        })
    }

    /// Put one copy back inside the caller's transaction. `None` when the
    /// book has been removed from the catalog.
    pub async fn increment(&self, conn: &mut PgConnection, id: i32) -> StoreResult<Option<i32>> {
        let copies: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET copies_available = copies_available + 1, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING copies_available
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(copies)
    }
}
