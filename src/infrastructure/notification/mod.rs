//! Invitation notifier implementations

mod log_notifier;
mod resend;

use std::sync::Arc;
use std::time::Duration;

pub use log_notifier::LogInvitationNotifier;
pub use resend::ResendInvitationNotifier;

use crate::config::{NotificationConfig, NotifierKind};
use crate::domain::notification::{InvitationNotifier, TeamInvitationNotice};
use crate::domain::DomainError;

/// Link the invitee follows to accept
pub fn invitation_link(app_url: &str, notice: &TeamInvitationNotice) -> String {
    format!(
        "{}/invitations/{}",
        app_url.trim_end_matches('/'),
        notice.invitation_id
    )
}

/// Builds the configured notifier
pub fn create_invitation_notifier(
    config: &NotificationConfig,
) -> Result<Arc<dyn InvitationNotifier>, DomainError> {
    match config.provider {
        NotifierKind::Log => Ok(Arc::new(LogInvitationNotifier::new(&config.app_url))),
        NotifierKind::Resend => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                DomainError::configuration(
                    "notifications.api_key is required for the resend provider",
                )
            })?;

            Ok(Arc::new(ResendInvitationNotifier::new(
                &config.api_base,
                api_key,
                &config.from,
                &config.app_url,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}
