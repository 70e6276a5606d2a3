//! Team membership entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{MembershipId, TeamId, UserId};
use crate::domain::team::TeamRole;

/// Status of a membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    /// Invitation sent, not yet accepted
    Pending,
    /// Occupies a seat
    Active,
    /// Set by external moderation; no transition into it is defined here
    Suspended,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemberStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            other => Err(format!("Unknown member status '{}'", other)),
        }
    }
}

/// A user's membership in a team
///
/// While `Pending` the row is an invitation and its id is the invitation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    id: MembershipId,
    team_id: TeamId,
    user_id: UserId,
    role: TeamRole,
    status: MemberStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    invited_by: Option<UserId>,
    /// Only set while pending
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    joined_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TeamMember {
    /// The active owner row created together with a team
    pub fn owner(team_id: TeamId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: MembershipId::generate(),
            team_id,
            user_id,
            role: TeamRole::Owner,
            status: MemberStatus::Active,
            invited_by: None,
            expires_at: None,
            joined_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// A pending invitation
    pub fn invitation(
        team_id: TeamId,
        user_id: UserId,
        role: TeamRole,
        invited_by: UserId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: MembershipId::generate(),
            team_id,
            user_id,
            role,
            status: MemberStatus::Pending,
            invited_by: Some(invited_by),
            expires_at: Some(expires_at),
            joined_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a membership from persisted fields
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: MembershipId,
        team_id: TeamId,
        user_id: UserId,
        role: TeamRole,
        status: MemberStatus,
        invited_by: Option<UserId>,
        expires_at: Option<DateTime<Utc>>,
        joined_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            team_id,
            user_id,
            role,
            status,
            invited_by,
            expires_at,
            joined_at,
            created_at,
            updated_at,
        }
    }

    // Getters

    pub fn id(&self) -> MembershipId {
        self.id
    }

    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> TeamRole {
        self.role
    }

    pub fn status(&self) -> MemberStatus {
        self.status
    }

    pub fn invited_by(&self) -> Option<UserId> {
        self.invited_by
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        self.joined_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Status checks

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn is_pending(&self) -> bool {
        self.status == MemberStatus::Pending
    }

    pub fn is_owner(&self) -> bool {
        self.role == TeamRole::Owner
    }

    /// True when an expiry is set and lies before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    // Mutators

    /// Accept the invitation
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = MemberStatus::Active;
        self.joined_at = Some(now);
        self.expires_at = None;
        self.updated_at = now;
    }

    /// Turn this row back into a pending invitation
    pub fn reinvite(&mut self, role: TeamRole, invited_by: UserId, expires_at: DateTime<Utc>) {
        self.role = role;
        self.status = MemberStatus::Pending;
        self.invited_by = Some(invited_by);
        self.expires_at = Some(expires_at);
        self.joined_at = None;
        self.touch();
    }

    /// Change the role
    pub fn set_role(&mut self, role: TeamRole) {
        self.role = role;
        self.touch();
    }

    /// Override the expiry (used to age invitations in tests and tooling)
    pub fn set_expires_at(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.expires_at = expires_at;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
