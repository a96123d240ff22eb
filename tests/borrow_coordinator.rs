//! Borrow/return behaviour against the in-memory store

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_test::{assert_err, assert_ok};

use library_server::{
    borrowing::{BorrowCoordinator, Fault, MemoryStore},
    config::PaginationConfig,
    models::{
        loan::{BorrowRequest, ReturnRequest},
        PageQuery,
    },
    services::{borrows::BorrowsService, validation::RequestValidator},
    AppError,
};

fn coordinator(store: &MemoryStore) -> BorrowCoordinator<MemoryStore> {
    BorrowCoordinator::new(store.clone())
}

fn due() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(14)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_copy_goes_to_exactly_one_of_two_concurrent_borrowers() {
    let store = MemoryStore::new();
    let book = store.add_book("Dune", 1).await;
    let alice = store.add_user().await;
    let bob = store.add_user().await;
    let coordinator = Arc::new(coordinator(&store));

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.borrow(alice, book, due()).await }
    });
    let second = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.borrow(bob, book, due()).await }
    });

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let unavailable = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::BookNotAvailable)))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(unavailable, 1);
    assert_eq!(store.copies(book).await, Some(0));
    assert_eq!(store.loans().await.len(), 1);
}

#[tokio::test]
async fn borrow_then_return_restores_the_count() {
    let store = MemoryStore::new();
    let book = store.add_book("Solaris", 3).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    let loan = assert_ok!(coordinator.borrow(holder, book, due()).await);
    assert_eq!(loan.user_id, holder);
    assert_eq!(loan.book_id, book);
    assert_eq!(store.copies(book).await, Some(2));

    let returned = assert_ok!(coordinator.return_book(holder, book).await);
    assert_eq!(returned.id, loan.id);
    assert_eq!(store.copies(book).await, Some(3));
    assert!(store.loans().await.is_empty());
}

#[tokio::test]
async fn zero_copies_leaves_the_ledger_untouched() {
    let store = MemoryStore::new();
    let book = store.add_book("Out of print", 0).await;
    let holder = store.add_user().await;

    let result = coordinator(&store).borrow(holder, book, due()).await;

    assert!(matches!(result, Err(AppError::BookNotAvailable)));
    assert_eq!(store.copies(book).await, Some(0));
    assert!(store.loans().await.is_empty());
}

#[tokio::test]
async fn return_succeeds_after_the_book_left_the_catalog() {
    let store = MemoryStore::new();
    let book = store.add_book("Withdrawn", 2).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    assert_ok!(coordinator.borrow(holder, book, due()).await);
    assert!(store.remove_book(book).await);

    assert_ok!(coordinator.return_book(holder, book).await);
    assert!(store.loans().await.is_empty());
    // Inventory of a removed book is left as it was
    assert_eq!(store.copies(book).await, Some(1));
}

#[tokio::test]
async fn borrowing_a_removed_book_is_not_found() {
    let store = MemoryStore::new();
    let book = store.add_book("Gone", 2).await;
    let holder = store.add_user().await;
    store.remove_book(book).await;

    let result = coordinator(&store).borrow(holder, book, due()).await;
    assert!(matches!(result, Err(AppError::BookNotFound)));
}

#[tokio::test]
async fn unknown_holder_and_book_are_reported() {
    let store = MemoryStore::new();
    let book = store.add_book("Known", 1).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    assert!(matches!(
        coordinator.borrow(holder + 100, book, due()).await,
        Err(AppError::UserNotFound)
    ));
    assert!(matches!(
        coordinator.borrow(holder, book + 100, due()).await,
        Err(AppError::BookNotFound)
    ));
    assert_eq!(store.copies(book).await, Some(1));
}

#[tokio::test]
async fn second_borrow_of_the_same_book_is_rejected() {
    let store = MemoryStore::new();
    let book = store.add_book("Twice", 5).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    assert_ok!(coordinator.borrow(holder, book, due()).await);
    let again = coordinator.borrow(holder, book, due()).await;

    assert!(matches!(again, Err(AppError::AlreadyBorrowed)));
    assert_eq!(store.copies(book).await, Some(4));
    assert_eq!(store.loans().await.len(), 1);
}

#[tokio::test]
async fn returning_without_a_loan_changes_nothing() {
    let store = MemoryStore::new();
    let book = store.add_book("Unborrowed", 2).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    for _ in 0..2 {
        let result = coordinator.return_book(holder, book).await;
        assert!(matches!(result, Err(AppError::BorrowNotFound)));
    }
    assert_eq!(store.copies(book).await, Some(2));
}

#[tokio::test]
async fn second_return_of_the_same_loan_fails() {
    let store = MemoryStore::new();
    let book = store.add_book("Once", 1).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    assert_ok!(coordinator.borrow(holder, book, due()).await);
    assert_ok!(coordinator.return_book(holder, book).await);
    let again = coordinator.return_book(holder, book).await;

    assert!(matches!(again, Err(AppError::BorrowNotFound)));
    assert_eq!(store.copies(book).await, Some(1));
}

#[tokio::test]
async fn failed_decrement_discards_the_tentative_loan() {
    let store = MemoryStore::new();
    let book = store.add_book("Fragile", 2).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    store.inject_fault(Fault::Decrement);
    let result = coordinator.borrow(holder, book, due()).await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert!(store.loans().await.is_empty());
    assert_eq!(store.copies(book).await, Some(2));

    // The fault fires once; a resubmitted borrow goes through
    assert_ok!(coordinator.borrow(holder, book, due()).await);
    assert_eq!(store.copies(book).await, Some(1));
}

#[tokio::test]
async fn failed_commit_leaves_no_trace() {
    let store = MemoryStore::new();
    let book = store.add_book("Uncommitted", 1).await;
    let holder = store.add_user().await;

    store.inject_fault(Fault::Commit);
    let result = coordinator(&store).borrow(holder, book, due()).await;

    assert_err!(result);
    assert!(store.loans().await.is_empty());
    assert_eq!(store.copies(book).await, Some(1));
}

#[tokio::test]
async fn failed_increment_keeps_the_loan() {
    let store = MemoryStore::new();
    let book = store.add_book("Sticky", 1).await;
    let holder = store.add_user().await;
    let coordinator = coordinator(&store);

    let loan = assert_ok!(coordinator.borrow(holder, book, due()).await);

    store.inject_fault(Fault::Increment);
    let result = coordinator.return_book(holder, book).await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(store.loans().await, vec![loan]);
    assert_eq!(store.copies(book).await, Some(0));
}

#[tokio::test]
async fn failed_begin_is_internal() {
    let store = MemoryStore::new();
    let book = store.add_book("Closed", 1).await;
    let holder = store.add_user().await;

    store.inject_fault(Fault::Begin);
    let result = coordinator(&store).borrow(holder, book, due()).await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(store.copies(book).await, Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn copies_are_conserved_under_concurrent_traffic() {
    const COPIES: i32 = 5;
    const HOLDERS: usize = 20;

    let store = MemoryStore::new();
    let book = store.add_book("Popular", COPIES).await;
    let mut holders = Vec::with_capacity(HOLDERS);
    for _ in 0..HOLDERS {
        holders.push(store.add_user().await);
    }
    let coordinator = Arc::new(coordinator(&store));

    let tasks: Vec<_> = holders
        .into_iter()
        .map(|holder| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let mut borrowed = 0;
                let mut returned = 0;
                for round in 0..4 {
                    match coordinator.borrow(holder, book, due()).await {
                        Ok(_) => borrowed += 1,
                        Err(AppError::BookNotAvailable) => {}
                        Err(e) => panic!("unexpected borrow error: {e}"),
                    }
                    // The last round leaves its loan outstanding
                    if round < 3 {
                        match coordinator.return_book(holder, book).await {
                            Ok(_) => returned += 1,
                            Err(AppError::BorrowNotFound) => {}
                            Err(e) => panic!("unexpected return error: {e}"),
                        }
                    }
                }
                (borrowed, returned)
            })
        })
        .collect();

    let mut borrowed = 0;
    let mut returned = 0;
    for task in tasks {
        let (b, r) = task.await.unwrap();
        borrowed += b;
        returned += r;
    }

    let remaining = store.copies(book).await.unwrap();
    assert!(remaining >= 0);
    assert_eq!(remaining, COPIES - borrowed + returned);
    assert_eq!(store.loans().await.len() as i32, borrowed - returned);
}

#[tokio::test]
async fn service_validates_before_touching_the_store() {
    let store = MemoryStore::new();
    let book = store.add_book("Guarded", 1).await;
    let holder = store.add_user().await;
    let service = BorrowsService::new(coordinator(&store), RequestValidator::default());

    let missing_book = BorrowRequest {
        book_id: 0,
        due_date: due(),
    };
    match service.borrow(holder, &missing_book).await {
        Err(AppError::Validation(message)) => assert_eq!(message, "book_id is required"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let overdue_already = BorrowRequest {
        book_id: book,
        due_date: Utc::now() - Duration::hours(1),
    };
    assert!(matches!(
        service.borrow(holder, &overdue_already).await,
        Err(AppError::Validation(_))
    ));

    assert!(matches!(
        service.return_book(holder, &ReturnRequest { book_id: -3 }).await,
        Err(AppError::Validation(_))
    ));

    assert_eq!(store.copies(book).await, Some(1));
    assert!(store.loans().await.is_empty());
}

#[tokio::test]
async fn service_lists_loans_per_holder_newest_first() {
    let store = MemoryStore::new();
    let first = store.add_book("First", 1).await;
    let second = store.add_book("Second", 1).await;
    let reader = store.add_user().await;
    let other = store.add_user().await;
    let service = BorrowsService::new(
        coordinator(&store),
        RequestValidator::new(PaginationConfig {
            default_limit: 10,
            max_limit: 50,
        }),
    );

    for book in [first, second] {
        let request = BorrowRequest {
            book_id: book,
            due_date: due(),
        };
        assert_ok!(service.borrow(reader, &request).await);
    }

    let own = assert_ok!(service.list_for_holder(reader, &PageQuery::default()).await);
    assert_eq!(own.total, 2);
    assert_eq!(own.page, 1);
    assert_eq!(own.limit, 10);
    assert_eq!(own.items[0].book_id, second);
    assert_eq!(own.items[1].book_id, first);
    assert!(own.items.iter().all(|loan| !loan.is_overdue));

    let none = assert_ok!(service.list_for_holder(other, &PageQuery::default()).await);
    assert_eq!(none.total, 0);

    let all = assert_ok!(
        service
            .list_all(&PageQuery {
                page: Some(2),
                limit: Some(1),
            })
            .await
    );
    assert_eq!(all.total, 2);
    assert_eq!(all.items.len(), 1);
    assert_eq!(all.items[0].book_id, first);

    let too_big = PageQuery {
        page: None,
        limit: Some(51),
    };
    assert!(matches!(
        service.list_all(&too_big).await,
        Err(AppError::Validation(_))
    ));
}
