//! Business logic services

pub mod auth;
pub mod borrows;
pub mod catalog;
pub mod users;
pub mod validation;

use crate::{
    borrowing::BorrowCoordinator,
    config::AppConfig,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub borrows: borrows::BorrowsService,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let validator = validation::RequestValidator::new(config.pagination.clone());

        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone(), validator.clone()),
            borrows: borrows::BorrowsService::new(
                BorrowCoordinator::new(repository.clone()),
                validator.clone(),
            ),
            catalog: catalog::CatalogService::new(repository.clone(), validator.clone()),
            users: users::UsersService::new(repository.clone(), validator),
            repository,
        }
    }

    /// Database connectivity check
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        self.repository.ping().await
    }
}
