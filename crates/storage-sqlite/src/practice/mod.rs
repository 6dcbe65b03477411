//! SQLite-backed implementation of the practice store contract.

mod repository;

pub use repository::SqlitePracticeStore;
