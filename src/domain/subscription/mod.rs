//! Subscription domain module
//!
//! Each team has exactly one subscription carrying its seat quota.

mod entity;
mod plan;
mod repository;

pub use entity::TeamSubscription;
pub use plan::{PlanCatalog, DEFAULT_PLAN};
pub use repository::SubscriptionRepository;

#[cfg(test)]
pub use repository::MockSubscriptionRepository;
