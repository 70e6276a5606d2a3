//! Subscription repository trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::TeamSubscription;
use crate::domain::ids::TeamId;
use crate::domain::DomainError;

/// Repository for team subscriptions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Get the subscription of a team
    async fn get(&self, team_id: &TeamId) -> Result<Option<TeamSubscription>, DomainError>;

    /// Update an existing subscription
    async fn update(&self, subscription: TeamSubscription)
        -> Result<TeamSubscription, DomainError>;
}
