//! Team entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_slug, validate_team_name, TeamValidationError};
use crate::domain::ids::{TeamId, UserId};

/// Role of a user within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    /// Team owner - exactly one per team, immutable
    Owner,
    /// Team admin - can invite and remove non-admin members
    Admin,
    /// Regular team member
    #[default]
    Member,
    /// Read-only member
    Viewer,
}

impl TeamRole {
    /// Check if this role can invite and remove members
    pub fn can_manage_members(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// Check if this role can change other members' roles
    pub fn can_change_roles(&self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Check if this role may remove a member holding `target`
    pub fn can_remove(&self, target: &TeamRole) -> bool {
        match (self, target) {
            (_, Self::Owner) => false,
            (Self::Owner, _) => true,
            (Self::Admin, Self::Admin) => false,
            (Self::Admin, _) => true,
            _ => false,
        }
    }

    /// Roles that can be handed out through invitations and role changes
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Self::Owner)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TeamRole {
    type Err = TeamValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            other => Err(TeamValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// Team entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    /// Display name
    name: String,
    /// Unique, URL-safe; fixed at creation
    slug: String,
    owner_id: UserId,
    plan: String,
    /// Customer record at the billing provider
    #[serde(skip_serializing_if = "Option::is_none")]
    billing_customer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Team {
    /// Create a new team
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        owner_id: UserId,
        plan: impl Into<String>,
    ) -> Result<Self, TeamValidationError> {
        let name = name.into();
        let slug = slug.into();
        validate_team_name(&name)?;
        validate_slug(&slug)?;
        let now = Utc::now();

        Ok(Self {
            id: TeamId::generate(),
            name,
            slug,
            owner_id,
            plan: plan.into(),
            billing_customer_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a team from persisted fields
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: TeamId,
        name: String,
        slug: String,
        owner_id: UserId,
        plan: String,
        billing_customer_id: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            slug,
            owner_id,
            plan,
            billing_customer_id,
            created_at,
            updated_at,
        }
    }

    /// Attach the billing customer reference (builder pattern)
    pub fn with_billing_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.billing_customer_id = Some(customer_id.into());
        self
    }

    // Getters

    pub fn id(&self) -> TeamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    pub fn billing_customer_id(&self) -> Option<&str> {
        self.billing_customer_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators

    /// Update the display name; the slug is left untouched
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), TeamValidationError> {
        let name = name.into();
        validate_team_name(&name)?;
        self.name = name;
        self.touch();
        Ok(())
    }

    /// Switch to another plan
    pub fn set_plan(&mut self, plan: impl Into<String>) {
        self.plan = plan.into();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
