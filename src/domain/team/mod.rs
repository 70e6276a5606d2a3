//! Team domain module
//!
//! A team is owned by exactly one user and groups members under a seat
//! quota taken from its subscription.

mod entity;
mod repository;
mod slug;
mod validation;

pub use entity::{Team, TeamRole};
pub use repository::TeamRepository;
pub use slug::{slug_candidates, slugify};
pub use validation::{validate_slug, validate_team_name, TeamValidationError};

#[cfg(test)]
pub use repository::MockTeamRepository;
