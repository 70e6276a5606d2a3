//! Notification domain - boundary to the mail delivery service

mod notifier;

pub use notifier::{InvitationNotifier, TeamInvitationNotice, DEFAULT_INVITER_NAME};

#[cfg(test)]
pub use notifier::MockInvitationNotifier;
