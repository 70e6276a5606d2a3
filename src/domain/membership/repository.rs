//! Membership repository trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::TeamMember;
use crate::domain::ids::{MembershipId, TeamId, UserId};
use crate::domain::DomainError;

/// Repository for team membership rows
///
/// Every write goes through the unit of work so it is ordered behind the
/// team's subscription lock.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Get a membership (or invitation) by ID
    async fn get(&self, id: &MembershipId) -> Result<Option<TeamMember>, DomainError>;

    /// Get the membership of `user_id` in `team_id`
    async fn find(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>, DomainError>;

    /// All rows for a team, ordered by creation
    async fn list_for_team(&self, team_id: &TeamId) -> Result<Vec<TeamMember>, DomainError>;

    /// All rows for a user, ordered by creation
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<TeamMember>, DomainError>;

    /// Number of ACTIVE rows for a team
    async fn count_active(&self, team_id: &TeamId) -> Result<u32, DomainError>;
}
