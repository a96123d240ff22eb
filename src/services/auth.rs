//! Authentication service: registration, login and token issuance

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    config::{AuthConfig, BootstrapAdmin},
    error::{AppError, AppResult},
    models::user::{CreateUser, Role, User, UserClaims},
    repository::Repository,
    services::validation::RequestValidator,
};

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Self-registration request; new accounts are members
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid email"))]
    pub email: String,
    #[validate(custom(function = "crate::services::validation::strong_password"))]
    pub password: String,
}

/// Hash a password with argon2 and a random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
    validator: RequestValidator,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig, validator: RequestValidator) -> Self {
        Self {
            repository,
            config,
            validator,
        }
    }

    /// Create a member account and return a token for it
    pub async fn register(&self, request: &RegisterRequest) -> AppResult<String> {
        self.validator.validate(request)?;

        let email = request.email.to_lowercase();
        if self.repository.users.email_exists(&email, None).await? {
            return Err(AppError::Conflict("email is already registered".to_string()));
        }

        let hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.name, &email, &hash, Role::Member)
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        self.issue_token(&user)
    }

    /// Check credentials and return a token
    pub async fn login(&self, request: &LoginRequest) -> AppResult<String> {
        self.validator.validate(request)?;

        let invalid = || AppError::Authentication("invalid email or password".to_string());

        let user = self
            .repository
            .users
            .get_by_email(&request.email.to_lowercase())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&request.password, &user.password)? {
            return Err(invalid());
        }

        self.issue_token(&user)
    }

    /// Create the configured admin account unless its email is taken.
    /// Returns the new user, or `None` when it already existed.
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> AppResult<Option<User>> {
        let request = CreateUser {
            name: admin.name.clone(),
            email: admin.email.to_lowercase(),
            password: admin.password.clone(),
            role: Some(Role::Admin),
        };
        self.validator.validate(&request)?;

        if self.repository.users.email_exists(&request.email, None).await? {
            tracing::debug!(email = %request.email, "Bootstrap admin already registered");
            return Ok(None);
        }

        let hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.name, &request.email, &hash, Role::Admin)
            .await?;

        tracing::info!(user_id = user.id, email = %user.email, "Bootstrap admin created");
        Ok(Some(user))
    }

    /// Current user behind a token
    pub async fn me(&self, claims: &UserClaims) -> AppResult<User> {
        self.repository.users.get_by_id(claims.user_id).await
    }

    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}
