//! Borrow/return transactions.
//!
//! [`BorrowCoordinator`] keeps the loan ledger and the per-book copy counts
//! in step. Storage is reached through the traits in [`store`]; the
//! PostgreSQL implementation lives in [`crate::repository`], and
//! [`memory::MemoryStore`] is a self-contained backend.

pub mod coordinator;
pub mod memory;
pub mod store;

pub use coordinator::BorrowCoordinator;
pub use memory::{Fault, MemoryStore};
pub use store::{
    Directory, InventoryStore, LoanLedger, StoreError, StoreResult, TransactionScope,
    Transactional,
};
