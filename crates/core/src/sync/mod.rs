//! Sync engine: pending-operation model, conflict policy, coordinator and
//! retry pacing.

mod coordinator;
mod merge;
mod model;
mod remote;
mod scheduler;

pub use coordinator::*;
pub use merge::*;
pub use model::*;
pub use remote::*;
pub use scheduler::*;
