//! Data models for the library server

pub mod book;
pub mod loan;
pub mod pagination;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use loan::{Loan, LoanDetails, NewLoan};
pub use pagination::{Page, PageQuery, Paginated};
pub use user::{Role, User, UserClaims, UserShort};
