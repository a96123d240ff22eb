//! Request validation.
//!
//! [`RequestValidator`] is built once from configuration and handed to the
//! services that bind client input; it holds no mutable state.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult},
    models::{Page, PageQuery},
};

static LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]").expect("valid regex"));
static UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").expect("valid regex"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid regex"));
static SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z\d]").expect("valid regex"));

/// At least 8 characters with a lowercase letter, an uppercase letter, a
/// digit and a special character
pub fn strong_password(password: &str) -> Result<(), ValidationError> {
    let strong = password.chars().count() >= 8
        && LOWER.is_match(password)
        && UPPER.is_match(password)
        && DIGIT.is_match(password)
        && SPECIAL.is_match(password);

    if strong {
        Ok(())
    } else {
        let mut error = ValidationError::new("password");
        error.message = Some(
            "password must be at least 8 characters long and contain lowercase, uppercase, digit and special characters"
                .into(),
        );
        Err(error)
    }
}

#[derive(Debug, Clone)]
pub struct RequestValidator {
    pagination: PaginationConfig,
}

impl RequestValidator {
    pub fn new(pagination: PaginationConfig) -> Self {
        Self { pagination }
    }

    /// Run the derived field rules, reporting the first failure
    pub fn validate<T: Validate>(&self, request: &T) -> AppResult<()> {
        request
            .validate()
            .map_err(|errors| AppError::Validation(first_message(&errors)))
    }

    /// Resolve `page`/`limit` with defaults, rejecting out-of-range values
    pub fn page(&self, query: &PageQuery) -> AppResult<Page> {
        let page = query.page.unwrap_or(1);
        let limit = query.limit.unwrap_or(self.pagination.default_limit);

        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if limit < 1 || limit > self.pagination.max_limit {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                self.pagination.max_limit
            )));
        }

        // Offsets past i64 are not addressable
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::Validation("page is out of range".to_string()));
        }

        Ok(Page::new(page, limit))
    }

    /// A due date must lie in the future
    pub fn due_date(&self, due_date: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
        if due_date <= now {
            return Err(AppError::Validation("due_date must be in the future".to_string()));
        }
        Ok(())
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(PaginationConfig::default())
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    return match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("{} is invalid", field),
                    };
                }
            }
            ValidationErrorsKind::Struct(nested) => return first_message(nested),
            ValidationErrorsKind::List(items) => {
                if let Some(nested) = items.values().next() {
                    return first_message(nested);
                }
            }
        }
    }

    "invalid input data".to_string()
}
