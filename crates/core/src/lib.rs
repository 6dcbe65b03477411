//! Core domain logic for the Aasanify offline-first sync engine.
//!
//! The crate owns the pieces with real invariants: the connectivity
//! observer, the conflict-resolution policy, the sync coordinator, and the
//! retry scheduler. Durable storage and the remote backend are reached
//! through the `PracticeStoreTrait` and `RemoteStoreTrait` seams so the
//! engine can be exercised without a database or a network.

pub mod auth;
pub mod connectivity;
pub mod errors;
pub mod practice;
pub mod sync;

pub use errors::{Error, Result, StoreError};
