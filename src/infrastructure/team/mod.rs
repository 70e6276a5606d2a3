//! Team membership service and its error taxonomy

mod error;
mod service;

pub use error::{MembershipError, MembershipErrorKind, SERVICE_ERROR_MESSAGE};
pub use service::{
    AcceptedInvitation, MembershipSettings, PendingInvitation, TeamDetails,
    TeamMembershipDeps, TeamMembershipService, DEFAULT_INVITATION_TTL_DAYS,
};
