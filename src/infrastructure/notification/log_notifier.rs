//! Notifier that writes invitations to the log

use async_trait::async_trait;
use tracing::info;

use super::invitation_link;
use crate::domain::notification::{InvitationNotifier, TeamInvitationNotice};
use crate::domain::DomainError;

/// For development: the invitation link shows up in the service log
#[derive(Debug, Clone)]
pub struct LogInvitationNotifier {
    app_url: String,
}

impl LogInvitationNotifier {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
        }
    }
}

#[async_trait]
impl InvitationNotifier for LogInvitationNotifier {
    async fn send_team_invitation(&self, notice: TeamInvitationNotice) -> Result<(), DomainError> {
        info!(
            email = %notice.email,
            team = %notice.team_name,
            inviter = %notice.inviter_name,
            link = %invitation_link(&self.app_url, &notice),
            "Team invitation"
        );
        Ok(())
    }
}
