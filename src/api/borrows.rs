//! Borrow and return endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookShort,
        loan::{BorrowRequest, Loan, LoanDetails, ReturnRequest},
        user::UserShort,
        PageQuery, Paginated,
    },
    AppState,
};

use super::{ApiJson, ApiQuery, AuthenticatedUser};

/// Borrow or return confirmation
#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    /// Status message
    pub message: String,
    pub data: LoanDetails,
}

/// Borrow a book for the authenticated user
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "No copies available or already borrowed")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowResponse>)> {
    let loan = state.services.borrows.borrow(claims.user_id, &request).await?;
    let data = details(&state, loan).await;

    Ok((
        StatusCode::CREATED,
        Json(BorrowResponse {
            message: "Book borrowed successfully".to_string(),
            data,
        }),
    ))
}

/// Return a book held by the authenticated user
#[utoipa::path(
    post,
    path = "/borrows/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = BorrowResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No active borrow for this book")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(request): ApiJson<ReturnRequest>,
) -> AppResult<Json<BorrowResponse>> {
    let loan = state
        .services
        .borrows
        .return_book(claims.user_id, &request)
        .await?;
    let data = details(&state, loan).await;

    Ok(Json(BorrowResponse {
        message: "Book returned successfully".to_string(),
        data,
    }))
}

/// List active borrows: every borrow for admins, own borrows for members
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Active borrows", body = Paginated<LoanDetails>),
        (status = 400, description = "Invalid pagination")
    )
)]
pub async fn list_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Paginated<LoanDetails>>> {
    let page = if claims.is_admin() {
        state.services.borrows.list_all(&query).await?
    } else {
        state
            .services
            .borrows
            .list_for_holder(claims.user_id, &query)
            .await?
    };
    Ok(Json(page))
}

/// List the authenticated user's active borrows
#[utoipa::path(
    get,
    path = "/borrows/me",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Own active borrows", body = Paginated<LoanDetails>),
        (status = 400, description = "Invalid pagination")
    )
)]
pub async fn my_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Paginated<LoanDetails>>> {
    let page = state
        .services
        .borrows
        .list_for_holder(claims.user_id, &query)
        .await?;
    Ok(Json(page))
}

/// List a user's active borrows
#[utoipa::path(
    get,
    path = "/borrows/user/{user_id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
        PageQuery
    ),
    responses(
        (status = 200, description = "User's active borrows", body = Paginated<LoanDetails>),
        (status = 403, description = "Not the user and not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Paginated<LoanDetails>>> {
    claims.require_self_or_admin(user_id)?;

    state.services.users.get_by_id(user_id).await?;
    let page = state
        .services
        .borrows
        .list_for_holder(user_id, &query)
        .await?;
    Ok(Json(page))
}

/// Attach book and holder summaries; a failed lookup leaves the field empty
async fn details(state: &AppState, loan: Loan) -> LoanDetails {
    let book = summary(
        state.services.catalog.get_book(loan.book_id).await,
        "book",
        loan.id,
    )
    .map(BookShort::from);
    let user = summary(
        state.services.users.get_by_id(loan.user_id).await,
        "holder",
        loan.id,
    )
    .map(UserShort::from);

    LoanDetails::from_loan(loan, book, user)
}

/// A missing record is expected after removal; any other failure is logged
fn summary<T>(lookup: AppResult<T>, what: &str, loan_id: i32) -> Option<T> {
    match lookup {
        Ok(record) => Some(record),
        Err(AppError::BookNotFound | AppError::UserNotFound) => None,
        Err(e) => {
            tracing::warn!(loan_id, "Loan {} lookup failed: {}", what, e);
            None
        }
    }
}
