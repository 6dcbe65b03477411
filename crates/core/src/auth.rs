//! Auth boundary contract.

use crate::practice::UserId;

/// Supplies the currently authenticated user, if any.
///
/// The retry scheduler consults this before each cycle; sync is never
/// invoked without a signed-in user.
pub trait AuthProviderTrait: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}
