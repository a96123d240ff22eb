//! Borrow/return against PostgreSQL.
//!
//! Runs when `DATABASE_URL` points at a scratch database; each test migrates
//! it and works on its own freshly created rows. Without the variable the
//! tests return early.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use tokio_test::assert_ok;

use library_server::{
    borrowing::{BorrowCoordinator, InventoryStore, Transactional, TransactionScope},
    config::{AppConfig, BootstrapAdmin},
    models::{book::CreateBook, Role},
    repository::Repository,
    services::Services,
    AppError,
};

async fn repository() -> Option<Repository> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Some(Repository::new(pool))
}

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Short unique suffix; ISBNs are capped at 20 characters
fn unique(prefix: &str) -> String {
    let micros = Utc::now().timestamp_micros() % 1_000_000_000_000;
    let n = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("{}{}{:03}", prefix, micros, n)
}

async fn book(repository: &Repository, copies: i32) -> i32 {
    repository
        .books
        .create(&CreateBook {
            title: "Inventory".to_string(),
            author: "Test".to_string(),
            isbn: unique("pg"),
            copies_available: copies,
            published_at: Utc::now(),
        })
        .await
        .unwrap()
        .id
}

async fn user(repository: &Repository) -> i32 {
    repository
        .users
        .create("Reader", &format!("{}@example.org", unique("pg")), "x", Role::Member)
        .await
        .unwrap()
        .id
}

async fn copies(repository: &Repository, book_id: i32) -> i32 {
    sqlx::query_scalar("SELECT copies_available FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(&repository.pool)
        .await
        .unwrap()
}

fn due() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(7)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_copy_goes_to_one_concurrent_borrower() {
    let Some(repository) = repository().await else { return };
    let book = book(&repository, 1).await;
    let mut holders = Vec::new();
    for _ in 0..4 {
        holders.push(user(&repository).await);
    }
    let coordinator = Arc::new(BorrowCoordinator::new(repository.clone()));

    let tasks: Vec<_> = holders
        .into_iter()
        .map(|holder| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.borrow(holder, book, due()).await })
        })
        .collect();

    let mut borrowed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => borrowed += 1,
            Err(AppError::BookNotAvailable) => {}
            Err(e) => panic!("unexpected borrow error: {e}"),
        }
    }

    assert_eq!(borrowed, 1);
    assert_eq!(copies(&repository, book).await, 0);
}

#[tokio::test]
async fn decrement_stops_at_zero() {
    let Some(repository) = repository().await else { return };
    let book = book(&repository, 1).await;

    let mut scope = assert_ok!(repository.begin().await);
    assert_eq!(repository.decrement(&mut scope, book).await.unwrap(), 0);
    assert!(repository.decrement(&mut scope, book).await.is_err());
    assert_ok!(scope.rollback().await);

    assert_eq!(copies(&repository, book).await, 1);
}

#[tokio::test]
async fn dropped_scope_rolls_back() {
    let Some(repository) = repository().await else { return };
    let book = book(&repository, 2).await;

    {
        let mut scope = assert_ok!(repository.begin().await);
        assert_ok!(repository.decrement(&mut scope, book).await);
    }

    assert_eq!(copies(&repository, book).await, 2);
}

#[tokio::test]
async fn return_after_removal_leaves_inventory_alone() {
    let Some(repository) = repository().await else { return };
    let book = book(&repository, 2).await;
    let holder = user(&repository).await;
    let coordinator = BorrowCoordinator::new(repository.clone());

    assert_ok!(coordinator.borrow(holder, book, due()).await);
    assert_ok!(repository.books.delete(book).await);

    let mut scope = assert_ok!(repository.begin().await);
    assert_eq!(repository.increment(&mut scope, book).await.unwrap(), None);
    assert_ok!(scope.rollback().await);

    assert_ok!(coordinator.return_book(holder, book).await);
    assert_eq!(copies(&repository, book).await, 1);
    assert!(matches!(
        coordinator.return_book(holder, book).await,
        Err(AppError::BorrowNotFound)
    ));
}

#[tokio::test]
async fn bootstrap_admin_is_created_once() {
    let Some(repository) = repository().await else { return };
    let services = Services::new(repository.clone(), &AppConfig::default());
    let admin = BootstrapAdmin {
        name: "Librarian".to_string(),
        email: format!("{}@EXAMPLE.org", unique("admin")),
        password: "L1brar!an".to_string(),
    };

    let created = assert_ok!(services.auth.bootstrap_admin(&admin).await).unwrap();
    assert_eq!(created.role, Role::Admin);
    assert_eq!(created.email, admin.email.to_lowercase());

    assert!(assert_ok!(services.auth.bootstrap_admin(&admin).await).is_none());
}
