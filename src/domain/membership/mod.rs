//! Membership domain module
//!
//! Memberships link users to teams. A pending membership is an invitation.

mod entity;
mod repository;

pub use entity::{MemberStatus, TeamMember};
pub use repository::MembershipRepository;

#[cfg(test)]
pub use repository::MockMembershipRepository;
