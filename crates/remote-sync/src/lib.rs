//! HTTP adapter for the authoritative practice backend.
//!
//! Implements the core remote store contract over a JSON document API and
//! maps transport and API failures into the retry classes the sync engine
//! acts on.

mod client;
mod error;

pub use client::PracticeSyncClient;
pub use error::{RemoteSyncError, Result};
