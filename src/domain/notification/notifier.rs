//! Invitation notifier trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::domain::ids::MembershipId;
use crate::domain::DomainError;

/// Fallback used when the inviter has no display name
pub const DEFAULT_INVITER_NAME: &str = "A team admin";

/// Everything needed to tell someone they were invited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInvitationNotice {
    pub email: String,
    pub team_name: String,
    pub invitation_id: MembershipId,
    pub inviter_name: String,
}

impl TeamInvitationNotice {
    pub fn new(
        email: impl Into<String>,
        team_name: impl Into<String>,
        invitation_id: MembershipId,
        inviter_name: Option<&str>,
    ) -> Self {
        let inviter_name = inviter_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_INVITER_NAME);

        Self {
            email: email.into(),
            team_name: team_name.into(),
            invitation_id,
            inviter_name: inviter_name.to_string(),
        }
    }
}

/// Delivers invitation messages (email in production)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InvitationNotifier: Send + Sync {
    async fn send_team_invitation(&self, notice: TeamInvitationNotice) -> Result<(), DomainError>;
}
