//! Request and response bodies for the membership endpoints

use serde::{Deserialize, Serialize};

use crate::domain::team::{Team, TeamRole};
use crate::infrastructure::team::PendingInvitation;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    /// Falls back to the catalog's default plan
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameTeamRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachBillingRequest {
    pub billing_subscription_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteMemberRequest {
    pub email: String,
    #[serde(default)]
    pub role: TeamRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: TeamRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListTeamsResponse {
    pub teams: Vec<Team>,
    pub total: usize,
}

impl From<Vec<Team>> for ListTeamsResponse {
    fn from(teams: Vec<Team>) -> Self {
        Self {
            total: teams.len(),
            teams,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListInvitationsResponse {
    pub invitations: Vec<PendingInvitation>,
    pub total: usize,
}

impl From<Vec<PendingInvitation>> for ListInvitationsResponse {
    fn from(invitations: Vec<PendingInvitation>) -> Self {
        Self {
            total: invitations.len(),
            invitations,
        }
    }
}
