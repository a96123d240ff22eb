//! Library catalog server
//!
//! REST JSON API over a catalog of books, its users and their borrows. The
//! borrow/return path keeps each book's available-copy count and the set of
//! active loans consistent under concurrent requests; see [`borrowing`].

use std::sync::Arc;

pub mod api;
pub mod borrowing;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::Repository) -> Self {
        let services = services::Services::new(repository, &config);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
