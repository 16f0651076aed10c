//! Session state seam.
//!
//! Authentication lives outside the core; the resolver only needs to know
//! whether an account is signed in and which tier it is on, at the moment
//! of each resolution.

use crate::model::SubscriptionTier;

/// Current account state, readable at any time.
pub trait SessionInfo: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn subscription(&self) -> SubscriptionTier;
}
