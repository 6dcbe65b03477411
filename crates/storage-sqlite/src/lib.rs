//! SQLite persistence for the practice cache and pending operation log.

mod db;
mod errors;
pub mod practice;

pub use errors::StorageError;
pub use practice::SqlitePracticeStore;
