//! User management service (admin)

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{CreateUser, UpdateUser, User, UserShort},
        PageQuery, Paginated,
    },
    repository::Repository,
    services::{auth::hash_password, validation::RequestValidator},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    validator: RequestValidator,
}

impl UsersService {
    pub fn new(repository: Repository, validator: RequestValidator) -> Self {
        Self {
            repository,
            validator,
        }
    }

    pub async fn list(&self, query: &PageQuery) -> AppResult<Paginated<UserShort>> {
        let page = self.validator.page(query)?;
        let (users, total) = self.repository.users.list(page).await?;
        Ok(Paginated::new(
            users.into_iter().map(UserShort::from).collect(),
            total,
            page,
        ))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn create(&self, request: &CreateUser) -> AppResult<User> {
        self.validator.validate(request)?;

        let email = request.email.to_lowercase();
        if self.repository.users.email_exists(&email, None).await? {
            return Err(AppError::Conflict("email is already registered".to_string()));
        }

        let hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.name, &email, &hash, request.role.unwrap_or_default())
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update(&self, id: i32, request: &UpdateUser) -> AppResult<User> {
        self.validator.validate(request)?;

        let mut user = self.repository.users.get_by_id(id).await?;

        if let Some(ref name) = request.name {
            user.name = name.clone();
        }
        if let Some(ref email) = request.email {
            let email = email.to_lowercase();
            if self.repository.users.email_exists(&email, Some(id)).await? {
                return Err(AppError::Conflict("email is already registered".to_string()));
            }
            user.email = email;
        }
        if let Some(ref password) = request.password {
            user.password = hash_password(password)?;
        }
        if let Some(role) = request.role {
            user.role = role;
        }

        self.repository.users.update(&user).await
    }

    /// Delete a user who holds no books
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.users.get_by_id(id).await?;

        if self.repository.users.has_loans(id).await? {
            return Err(AppError::UserHasBorrows);
        }

        self.repository.users.delete(id).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}
