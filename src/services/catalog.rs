//! Catalog management service

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        PageQuery, Paginated,
    },
    repository::Repository,
    services::validation::RequestValidator,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    validator: RequestValidator,
}

impl CatalogService {
    pub fn new(repository: Repository, validator: RequestValidator) -> Self {
        Self {
            repository,
            validator,
        }
    }

    pub async fn list_books(&self, query: &PageQuery) -> AppResult<Paginated<Book>> {
        let page = self.validator.page(query)?;
        let (books, total) = self.repository.books.list(page).await?;
        Ok(Paginated::new(books, total, page))
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, request: &CreateBook) -> AppResult<Book> {
        self.validator.validate(request)?;

        if self.repository.books.isbn_exists(&request.isbn, None).await? {
            return Err(AppError::Conflict("isbn is already registered".to_string()));
        }

        let book = self.repository.books.create(request).await?;
        tracing::info!(book_id = book.id, copies = book.copies_available, "Book created");
        Ok(book)
    }

    pub async fn update_book(&self, id: i32, request: &UpdateBook) -> AppResult<Book> {
        self.validator.validate(request)?;

        let mut book = self.repository.books.get_by_id(id).await?;

        if let Some(ref isbn) = request.isbn {
            if self.repository.books.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict("isbn is already registered".to_string()));
            }
        }

        request.apply_to(&mut book);
        self.repository.books.update(&book).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book removed from catalog");
        Ok(())
    }
}
