//! Loans repository: the ledger of active loans

use sqlx::{postgres::PgRow, PgConnection, Pool, Postgres, Row};

use super::is_unique_violation;
use crate::{
    borrowing::{StoreError, StoreResult},
    models::{
        book::BookShort,
        loan::{Loan, LoanDetails, NewLoan},
        user::UserShort,
        Page,
    },
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Record a new loan inside the caller's transaction
    pub async fn create(&self, conn: &mut PgConnection, loan: &NewLoan) -> StoreResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, book_id, due_date)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, book_id, due_date, created_at
            "#,
        )
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(loan.due_date)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate
            } else {
                e.into()
            }
        })
    }

    /// Active loan of `book_id` held by `holder_id`
    pub async fn find(&self, holder_id: i32, book_id: i32) -> StoreResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, user_id, book_id, due_date, created_at
            FROM loans
            WHERE user_id = $1 AND book_id = $2
            "#,
        )
        .bind(holder_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    /// Remove a loan inside the caller's transaction
    pub async fn delete(&self, conn: &mut PgConnection, loan: &Loan) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(loan.id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Loans with book and holder details, newest first. `holder_id` of
    /// `None` lists every loan.
    pub async fn list(&self, holder_id: Option<i32>, page: Page) -> StoreResult<(Vec<LoanDetails>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE ($1::INT IS NULL OR user_id = $1)",
        )
        .bind(holder_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT l.id, l.user_id, l.book_id, l.due_date, l.created_at,
                   b.title, b.author, b.isbn, b.copies_available,
                   (b.deleted_at IS NOT NULL) AS book_deleted,
                   u.name AS user_name, u.email AS user_email, u.role AS user_role
            FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN users u ON u.id = l.user_id
            WHERE ($1::INT IS NULL OR l.user_id = $1)
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(holder_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let loans = rows.iter().map(loan_details_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok((loans, total))
    }
}

fn loan_details_from_row(row: &PgRow) -> Result<LoanDetails, sqlx::Error> {
    let loan = Loan {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        due_date: row.try_get("due_date")?,
        created_at: row.try_get("created_at")?,
    };

    let book_deleted: bool = row.try_get("book_deleted")?;
    let book = if book_deleted {
        None
    } else {
        Some(BookShort {
            id: loan.book_id,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            isbn: row.try_get("isbn")?,
            copies_available: row.try_get("copies_available")?,
        })
    };

    let user = UserShort {
        id: loan.user_id,
        name: row.try_get("user_name")?,
        email: row.try_get("user_email")?,
        role: row.try_get("user_role")?,
    };

    Ok(LoanDetails::from_loan(loan, book, Some(user)))
}
