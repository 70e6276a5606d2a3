//! In-memory store implementing every repository and the unit of work
//!
//! Useful for testing and development. Data is lost when the process terminates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::domain::ids::{MembershipId, TeamId, UserId};
use crate::domain::membership::{MembershipRepository, TeamMember};
use crate::domain::subscription::{SubscriptionRepository, TeamSubscription};
use crate::domain::team::{Team, TeamRepository};
use crate::domain::unit_of_work::{TeamTransaction, UnitOfWork};
use crate::domain::user::{User, UserRepository};
use crate::domain::DomainError;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    teams: HashMap<TeamId, Team>,
    members: HashMap<MembershipId, TeamMember>,
    subscriptions: HashMap<TeamId, TeamSubscription>,
}

impl Tables {
    fn insert_team(&mut self, team: &Team) -> Result<(), DomainError> {
        if self.teams.contains_key(&team.id()) {
            return Err(DomainError::conflict(format!(
                "Team '{}' already exists",
                team.id()
            )));
        }

        if self.teams.values().any(|t| t.slug() == team.slug()) {
            return Err(DomainError::conflict(format!(
                "Team slug '{}' already taken",
                team.slug()
            )));
        }

        self.teams.insert(team.id(), team.clone());
        Ok(())
    }

    fn update_team(&mut self, team: &Team) -> Result<(), DomainError> {
        match self.teams.get_mut(&team.id()) {
            Some(existing) => {
                *existing = team.clone();
                Ok(())
            }
            None => Err(DomainError::not_found(format!(
                "Team '{}' not found",
                team.id()
            ))),
        }
    }

    fn insert_member(&mut self, member: &TeamMember) -> Result<(), DomainError> {
        if self.members.contains_key(&member.id()) {
            return Err(DomainError::conflict(format!(
                "Membership '{}' already exists",
                member.id()
            )));
        }

        if self.find_member(&member.team_id(), &member.user_id()).is_some() {
            return Err(DomainError::conflict(format!(
                "User '{}' already has a membership in team '{}'",
                member.user_id(),
                member.team_id()
            )));
        }

        self.members.insert(member.id(), member.clone());
        Ok(())
    }

    fn update_member(&mut self, member: &TeamMember) -> Result<(), DomainError> {
        match self.members.get_mut(&member.id()) {
            Some(existing) => {
                *existing = member.clone();
                Ok(())
            }
            None => Err(DomainError::not_found(format!(
                "Membership '{}' not found",
                member.id()
            ))),
        }
    }

    fn find_member(&self, team_id: &TeamId, user_id: &UserId) -> Option<&TeamMember> {
        self.members
            .values()
            .find(|m| m.team_id() == *team_id && m.user_id() == *user_id)
    }

    fn count_active(&self, team_id: &TeamId) -> u32 {
        self.members
            .values()
            .filter(|m| m.team_id() == *team_id && m.is_active())
            .count() as u32
    }

    fn insert_subscription(&mut self, subscription: &TeamSubscription) -> Result<(), DomainError> {
        if self.subscriptions.contains_key(&subscription.team_id()) {
            return Err(DomainError::conflict(format!(
                "Subscription for team '{}' already exists",
                subscription.team_id()
            )));
        }

        self.subscriptions
            .insert(subscription.team_id(), subscription.clone());
        Ok(())
    }

    fn update_subscription(&mut self, subscription: &TeamSubscription) -> Result<(), DomainError> {
        match self.subscriptions.get_mut(&subscription.team_id()) {
            Some(existing) => {
                *existing = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::not_found(format!(
                "Subscription for team '{}' not found",
                subscription.team_id()
            ))),
        }
    }
}

fn sorted_members<'a>(members: impl Iterator<Item = &'a TeamMember>) -> Vec<TeamMember> {
    let mut result: Vec<TeamMember> = members.cloned().collect();
    result.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
    result
}

/// Thread-safe in-memory store
///
/// A transaction holds the write lock for its whole lifetime and works on a
/// staged copy of the tables, so transactions are fully serialized and a
/// dropped transaction leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with users
    pub fn with_users(users: Vec<User>) -> Self {
        let tables = Tables {
            users: users.into_iter().map(|u| (u.id(), u)).collect(),
            ..Default::default()
        };

        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email() == email).cloned())
    }

    async fn upsert_by_email(&self, candidate: User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.users.values().find(|u| u.email() == candidate.email()) {
            return Ok(existing.clone());
        }

        tables.users.insert(candidate.id(), candidate.clone());
        Ok(candidate)
    }
}

#[async_trait]
impl TeamRepository for InMemoryStore {
    async fn get(&self, id: &TeamId) -> Result<Option<Team>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.teams.get(id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Team>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.teams.values().find(|t| t.slug() == slug).cloned())
    }

    async fn update(&self, team: Team) -> Result<Team, DomainError> {
        let mut tables = self.tables.write().await;
        tables.update_team(&team)?;
        Ok(team)
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn get(&self, id: &MembershipId) -> Result<Option<TeamMember>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.members.get(id).cloned())
    }

    async fn find(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.find_member(team_id, user_id).cloned())
    }

    async fn list_for_team(&self, team_id: &TeamId) -> Result<Vec<TeamMember>, DomainError> {
        let tables = self.tables.read().await;
        Ok(sorted_members(
            tables.members.values().filter(|m| m.team_id() == *team_id),
        ))
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<TeamMember>, DomainError> {
        let tables = self.tables.read().await;
        Ok(sorted_members(
            tables.members.values().filter(|m| m.user_id() == *user_id),
        ))
    }

    async fn count_active(&self, team_id: &TeamId) -> Result<u32, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.count_active(team_id))
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn get(&self, team_id: &TeamId) -> Result<Option<TeamSubscription>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.subscriptions.get(team_id).cloned())
    }

    async fn update(
        &self,
        subscription: TeamSubscription,
    ) -> Result<TeamSubscription, DomainError> {
        let mut tables = self.tables.write().await;
        tables.update_subscription(&subscription)?;
        Ok(subscription)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn TeamTransaction>, DomainError> {
        let guard = self.tables.clone().write_owned().await;
        let staged = guard.clone();

        Ok(Box::new(InMemoryTransaction { guard, staged }))
    }
}

/// Transaction over [`InMemoryStore`]
struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl TeamTransaction for InMemoryTransaction {
    async fn insert_team(&mut self, team: &Team) -> Result<(), DomainError> {
        self.staged.insert_team(team)
    }

    async fn update_team(&mut self, team: &Team) -> Result<(), DomainError> {
        self.staged.update_team(team)
    }

    async fn get_member(&mut self, id: &MembershipId) -> Result<Option<TeamMember>, DomainError> {
        Ok(self.staged.members.get(id).cloned())
    }

    async fn insert_member(&mut self, member: &TeamMember) -> Result<(), DomainError> {
        self.staged.insert_member(member)
    }

    async fn update_member(&mut self, member: &TeamMember) -> Result<(), DomainError> {
        self.staged.update_member(member)
    }

    async fn delete_member(&mut self, id: &MembershipId) -> Result<bool, DomainError> {
        Ok(self.staged.members.remove(id).is_some())
    }

    async fn insert_subscription(
        &mut self,
        subscription: &TeamSubscription,
    ) -> Result<(), DomainError> {
        self.staged.insert_subscription(subscription)
    }

    async fn update_subscription(
        &mut self,
        subscription: &TeamSubscription,
    ) -> Result<(), DomainError> {
        self.staged.update_subscription(subscription)
    }

    async fn lock_subscription(
        &mut self,
        team_id: &TeamId,
    ) -> Result<Option<TeamSubscription>, DomainError> {
        // The whole store is already locked for this transaction
        Ok(self.staged.subscriptions.get(team_id).cloned())
    }

    async fn count_active_members(&mut self, team_id: &TeamId) -> Result<u32, DomainError> {
        Ok(self.staged.count_active(team_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let InMemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
