//! Transaction storage
//!
//! Records live in process memory and are lost on restart.

pub mod error;
pub mod repository;
pub mod transaction_repository;

pub use error::{DatabaseError, DatabaseErrorKind};
pub use repository::Repository;
pub use transaction_repository::{Transaction, TransactionRepository};
