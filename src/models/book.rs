//! Book (catalog) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    /// Copies not currently on loan
    pub copies_available: i32,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short book representation embedded in loan listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub copies_available: i32,
}

impl From<Book> for BookShort {
    fn from(book: Book) -> Self {
        BookShort {
            id: book.id,
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            copies_available: book.copies_available,
        }
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "author is required"))]
    pub author: String,
    #[validate(length(min = 1, max = 20, message = "isbn is required"))]
    pub isbn: String,
    #[validate(range(min = 1, message = "copies_available must be at least 1"))]
    pub copies_available: i32,
    pub published_at: DateTime<Utc>,
}

/// Update book request.
///
/// The copy count is owned by the borrow/return flow and cannot be edited here.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100, message = "author must not be empty"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 20, message = "isbn must not be empty"))]
    pub isbn: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl UpdateBook {
    /// Apply the provided fields onto an existing book
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref isbn) = self.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(published_at) = self.published_at {
            book.published_at = published_at;
        }
    }
}
