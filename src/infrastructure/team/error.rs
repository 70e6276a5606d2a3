//! Error taxonomy returned by the team membership service

use thiserror::Error;
use tracing::error;

use crate::domain::DomainError;

/// Fixed message shown for every unexpected failure
pub const SERVICE_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Machine-checkable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Invalid,
    Service,
}

impl MembershipErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::Service => "service_error",
        }
    }
}

/// Closed set of failures every membership operation can produce
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("{reason}")]
    NotFound { reason: String },

    #[error("{reason}")]
    Forbidden { reason: String },

    #[error("{reason}")]
    Conflict { reason: String },

    #[error("{reason}")]
    Invalid { reason: String },

    #[error("{}", SERVICE_ERROR_MESSAGE)]
    Service,
}

impl MembershipError {
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// Logs the underlying failure and hides it behind [`MembershipError::Service`]
    pub fn unexpected(operation: &str, source: DomainError) -> Self {
        error!(operation, error = %source, "Membership operation failed");
        Self::Service
    }

    pub fn kind(&self) -> MembershipErrorKind {
        match self {
            Self::NotFound { .. } => MembershipErrorKind::NotFound,
            Self::Forbidden { .. } => MembershipErrorKind::Forbidden,
            Self::Conflict { .. } => MembershipErrorKind::Conflict,
            Self::Invalid { .. } => MembershipErrorKind::Invalid,
            Self::Service => MembershipErrorKind::Service,
        }
    }

    /// HTTP-like status code; conflicts share 400 with invalid input
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            MembershipErrorKind::NotFound => 404,
            MembershipErrorKind::Forbidden => 403,
            MembershipErrorKind::Conflict | MembershipErrorKind::Invalid => 400,
            MembershipErrorKind::Service => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MembershipError::not_found("x").status_code(), 404);
        assert_eq!(MembershipError::forbidden("x").status_code(), 403);
        assert_eq!(MembershipError::conflict("x").status_code(), 400);
        assert_eq!(MembershipError::invalid("x").status_code(), 400);
        assert_eq!(MembershipError::Service.status_code(), 500);
    }

    #[test]
    fn test_unexpected_hides_details() {
        let err = MembershipError::unexpected(
            "create_team",
            DomainError::storage("connection refused on 10.0.0.3"),
        );

        assert_eq!(err.kind(), MembershipErrorKind::Service);
        assert_eq!(err.to_string(), SERVICE_ERROR_MESSAGE);
    }

    #[test]
    fn test_reason_is_display() {
        let err = MembershipError::conflict("User is already a member of this team");
        assert_eq!(err.to_string(), "User is already a member of this team");
        assert_eq!(err.kind().as_str(), "conflict");
    }
}
