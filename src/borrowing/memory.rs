//! In-memory storage backend.
//!
//! A transaction scope holds the store-wide lock from `begin` until it is
//! committed, rolled back or dropped, and works on a staged copy of the
//! state. Commit swaps the staged copy in; anything else throws it away.
//! Faults can be armed to make a chosen step fail once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::store::{
    Directory, InventoryStore, LoanLedger, StoreError, StoreResult, TransactionScope,
    Transactional,
};
use crate::models::{BookShort, Loan, LoanDetails, NewLoan, Page};

/// Steps that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    CreateLoan,
    Decrement,
    DeleteLoan,
    Increment,
    Commit,
}

#[derive(Debug, Clone)]
struct BookEntry {
    book: BookShort,
    deleted: bool,
}

#[derive(Debug, Clone, Default)]
struct State {
    books: HashMap<i32, BookEntry>,
    users: HashSet<i32>,
    loans: BTreeMap<i32, Loan>,
    next_book_id: i32,
    next_user_id: i32,
    next_loan_id: i32,
}

impl State {
    fn live_book(&self, book_id: i32) -> Option<&BookEntry> {
        self.books.get(&book_id).filter(|entry| !entry.deleted)
    }

    fn page_of<'a>(&self, loans: impl Iterator<Item = &'a Loan>, page: Page) -> (Vec<LoanDetails>, i64) {
        let mut loans: Vec<&Loan> = loans.collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = loans.len() as i64;
        let rows = loans
            .into_iter()
            .skip(page.offset().max(0) as usize)
            .take(page.limit.max(0) as usize)
            .map(|loan| {
                let book = self.live_book(loan.book_id).map(|entry| entry.book.clone());
                LoanDetails::from_loan(loan.clone(), book, None)
            })
            .collect();

        (rows, total)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<StdMutex<HashSet<Fault>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a book with the given number of copies and return its id
    pub async fn add_book(&self, title: &str, copies: i32) -> i32 {
        let mut state = self.state.lock().await;
        state.next_book_id += 1;
        let id = state.next_book_id;
        state.books.insert(
            id,
            BookEntry {
                book: BookShort {
                    id,
                    title: title.to_string(),
                    author: "Unknown".to_string(),
                    isbn: format!("MEM-{:06}", id),
                    copies_available: copies,
                },
                deleted: false,
            },
        );
        id
    }

    /// Remove a book from the catalog; its loans stay on the ledger
    pub async fn remove_book(&self, book_id: i32) -> bool {
        let mut state = self.state.lock().await;
        match state.books.get_mut(&book_id) {
            Some(entry) if !entry.deleted => {
                entry.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Register a user and return its id
    pub async fn add_user(&self) -> i32 {
        let mut state = self.state.lock().await;
        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.insert(id);
        id
    }

    /// Current copy count, also for books removed from the catalog
    pub async fn copies(&self, book_id: i32) -> Option<i32> {
        let state = self.state.lock().await;
        state.books.get(&book_id).map(|entry| entry.book.copies_available)
    }

    /// Every active loan, oldest first
    pub async fn loans(&self) -> Vec<Loan> {
        let state = self.state.lock().await;
        state.loans.values().cloned().collect()
    }

    /// Make the next call of `step` fail with a backend error
    pub fn inject_fault(&self, step: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(step);
    }

    fn trip(&self, step: Fault) -> StoreResult<()> {
        let fired = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&step);
        if fired {
            Err(StoreError::Backend(format!("injected fault at {:?}", step)))
        } else {
            Ok(())
        }
    }
}

/// Exclusive, staged view of the store
pub struct MemoryScope {
    guard: OwnedMutexGuard<State>,
    staged: State,
    faults: Arc<StdMutex<HashSet<Fault>>>,
}

#[async_trait]
impl TransactionScope for MemoryScope {
    async fn commit(self) -> StoreResult<()> {
        let MemoryScope {
            mut guard,
            staged,
            faults,
        } = self;

        let fired = faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&Fault::Commit);
        if fired {
            return Err(StoreError::Backend("injected fault at Commit".to_string()));
        }

        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    type Scope = MemoryScope;

    async fn begin(&self) -> StoreResult<MemoryScope> {
        self.trip(Fault::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryScope {
            guard,
            staged,
            faults: self.faults.clone(),
        })
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn book_exists(&self, book_id: i32) -> StoreResult<bool> {
        Ok(self.state.lock().await.live_book(book_id).is_some())
    }

    async fn copies_available(&self, book_id: i32) -> StoreResult<Option<i32>> {
        let state = self.state.lock().await;
        Ok(state.live_book(book_id).map(|entry| entry.book.copies_available))
    }

    async fn user_exists(&self, user_id: i32) -> StoreResult<bool> {
        Ok(self.state.lock().await.users.contains(&user_id))
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn decrement(&self, scope: &mut MemoryScope, book_id: i32) -> StoreResult<i32> {
        self.trip(Fault::Decrement)?;
        let entry = scope
            .staged
            .books
            .get_mut(&book_id)
            .filter(|entry| !entry.deleted)
            .ok_or(StoreError::NotFound)?;

        if entry.book.copies_available <= 0 {
            return Err(StoreError::NoCopiesAvailable);
        }
        entry.book.copies_available -= 1;
        Ok(entry.book.copies_available)
    }

    async fn increment(&self, scope: &mut MemoryScope, book_id: i32) -> StoreResult<Option<i32>> {
        self.trip(Fault::Increment)?;
        match scope.staged.books.get_mut(&book_id) {
            Some(entry) if !entry.deleted => {
                entry.book.copies_available += 1;
                Ok(Some(entry.book.copies_available))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl LoanLedger for MemoryStore {
    async fn create(&self, scope: &mut MemoryScope, loan: &NewLoan) -> StoreResult<Loan> {
        self.trip(Fault::CreateLoan)?;
        let state = &mut scope.staged;

        let duplicate = state
            .loans
            .values()
            .any(|l| l.user_id == loan.user_id && l.book_id == loan.book_id);
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        state.next_loan_id += 1;
        let record = Loan {
            id: state.next_loan_id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            due_date: loan.due_date,
            created_at: Utc::now(),
        };
        state.loans.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, holder_id: i32, book_id: i32) -> StoreResult<Option<Loan>> {
        let state = self.state.lock().await;
        Ok(state
            .loans
            .values()
            .find(|l| l.user_id == holder_id && l.book_id == book_id)
            .cloned())
    }

    async fn delete(&self, scope: &mut MemoryScope, loan: &Loan) -> StoreResult<()> {
        self.trip(Fault::DeleteLoan)?;
        scope
            .staged
            .loans
            .remove(&loan.id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_holder(&self, holder_id: i32, page: Page) -> StoreResult<(Vec<LoanDetails>, i64)> {
        let state = self.state.lock().await;
        let loans = state.loans.values().filter(|l| l.user_id == holder_id);
        Ok(state.page_of(loans, page))
    }

    async fn list_all(&self, page: Page) -> StoreResult<(Vec<LoanDetails>, i64)> {
        let state = self.state.lock().await;
        Ok(state.page_of(state.loans.values(), page))
    }
}
