//! Team repository trait

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::entity::Team;
use crate::domain::ids::TeamId;
use crate::domain::DomainError;

/// Repository for reading and updating teams
///
/// Teams are inserted only through the unit of work, together with their
/// owner membership and subscription.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// Get a team by ID
    async fn get(&self, id: &TeamId) -> Result<Option<Team>, DomainError>;

    /// Get a team by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Team>, DomainError>;

    /// Check whether a slug is taken
    async fn slug_exists(&self, slug: &str) -> Result<bool, DomainError> {
        Ok(self.get_by_slug(slug).await?.is_some())
    }

    /// Update an existing team
    async fn update(&self, team: Team) -> Result<Team, DomainError>;
}
