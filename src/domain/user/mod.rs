//! User domain
//!
//! Users are resolved by email. Authentication happens upstream, so this
//! module only carries identity and display data.

mod entity;
mod repository;
mod validation;

pub use entity::User;
pub use repository::UserRepository;
pub use validation::{
    normalize_email, validate_display_name, validate_email, UserValidationError,
};

#[cfg(test)]
pub use repository::MockUserRepository;
