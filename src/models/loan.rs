//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::BookShort;
use super::user::UserShort;

/// Active loan record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    /// Holder of the borrowed copy
    pub user_id: i32,
    pub book_id: i32,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to record a new loan
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: i32,
    pub book_id: i32,
    pub due_date: DateTime<Utc>,
}

/// Loan with book and holder details for listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_overdue: bool,
    /// Absent once the book has been removed from the catalog
    pub book: Option<BookShort>,
    pub user: Option<UserShort>,
}

impl LoanDetails {
    pub fn from_loan(loan: Loan, book: Option<BookShort>, user: Option<UserShort>) -> Self {
        LoanDetails {
            is_overdue: loan.due_date < Utc::now(),
            id: loan.id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            due_date: loan.due_date,
            created_at: loan.created_at,
            book,
            user,
        }
    }
}

/// Borrow request body; the holder comes from the bearer token
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    #[validate(range(min = 1, message = "book_id is required"))]
    pub book_id: i32,
    pub due_date: DateTime<Utc>,
}

/// Return request body
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReturnRequest {
    #[validate(range(min = 1, message = "book_id is required"))]
    pub book_id: i32,
}
