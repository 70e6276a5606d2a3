//! Team validation

use thiserror::Error;

/// Errors that can occur during team validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TeamValidationError {
    #[error("Team name cannot be empty")]
    EmptyName,

    #[error("Team name cannot exceed {0} characters")]
    NameTooLong(usize),

    #[error("Team slug cannot be empty")]
    EmptySlug,

    #[error("Team slug cannot exceed {0} characters")]
    SlugTooLong(usize),

    #[error("Team slug can only contain lowercase alphanumeric characters and hyphens")]
    InvalidSlugCharacters,

    #[error("Team slug cannot start or end with a hyphen")]
    InvalidSlugFormat,

    #[error("Unknown team role '{0}'")]
    UnknownRole(String),
}

const MAX_TEAM_NAME_LENGTH: usize = 100;
const MAX_SLUG_LENGTH: usize = 120;

/// Validate a team name
pub fn validate_team_name(name: &str) -> Result<(), TeamValidationError> {
    if name.trim().is_empty() {
        return Err(TeamValidationError::EmptyName);
    }

    if name.chars().count() > MAX_TEAM_NAME_LENGTH {
        return Err(TeamValidationError::NameTooLong(MAX_TEAM_NAME_LENGTH));
    }

    Ok(())
}

/// Validate a team slug
pub fn validate_slug(slug: &str) -> Result<(), TeamValidationError> {
    if slug.is_empty() {
        return Err(TeamValidationError::EmptySlug);
    }

    if slug.len() > MAX_SLUG_LENGTH {
        return Err(TeamValidationError::SlugTooLong(MAX_SLUG_LENGTH));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(TeamValidationError::InvalidSlugCharacters);
    }

    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(TeamValidationError::InvalidSlugFormat);
    }

    Ok(())
}
