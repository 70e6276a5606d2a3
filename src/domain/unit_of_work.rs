//! Unit of work for multi-row writes
//!
//! A transaction is obtained with [`UnitOfWork::begin`]. Changes become
//! visible only after [`TeamTransaction::commit`]; dropping the transaction
//! without committing discards them.

use async_trait::async_trait;

use crate::domain::ids::{MembershipId, TeamId};
use crate::domain::membership::TeamMember;
use crate::domain::subscription::TeamSubscription;
use crate::domain::team::Team;
use crate::domain::DomainError;

/// Factory for transactions over teams, memberships and subscriptions
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn TeamTransaction>, DomainError>;
}

/// Transactional view of the team tables
///
/// Implementations must fail with a conflict when a unique constraint is
/// violated (team slug, one membership per team and user).
#[async_trait]
pub trait TeamTransaction: Send {
    async fn insert_team(&mut self, team: &Team) -> Result<(), DomainError>;

    async fn update_team(&mut self, team: &Team) -> Result<(), DomainError>;

    async fn get_member(&mut self, id: &MembershipId) -> Result<Option<TeamMember>, DomainError>;

    async fn insert_member(&mut self, member: &TeamMember) -> Result<(), DomainError>;

    async fn update_member(&mut self, member: &TeamMember) -> Result<(), DomainError>;

    /// Returns false if the row did not exist
    async fn delete_member(&mut self, id: &MembershipId) -> Result<bool, DomainError>;

    async fn insert_subscription(
        &mut self,
        subscription: &TeamSubscription,
    ) -> Result<(), DomainError>;

    async fn update_subscription(
        &mut self,
        subscription: &TeamSubscription,
    ) -> Result<(), DomainError>;

    /// Read a team's subscription and keep it locked until the transaction ends.
    ///
    /// Seat-gated writes call this first so that concurrent admissions for
    /// the same team are serialized.
    async fn lock_subscription(
        &mut self,
        team_id: &TeamId,
    ) -> Result<Option<TeamSubscription>, DomainError>;

    async fn count_active_members(&mut self, team_id: &TeamId) -> Result<u32, DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
