//! JSON error envelope returned by every endpoint

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::infrastructure::team::{MembershipError, MembershipErrorKind};

/// Coarse category clients can switch on; `code` carries the membership kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    AuthenticationError,
    PermissionError,
    NotFoundError,
    ServerError,
}

impl ApiErrorType {
    fn status(self) -> StatusCode {
        match self {
            Self::InvalidRequestError => StatusCode::BAD_REQUEST,
            Self::AuthenticationError => StatusCode::UNAUTHORIZED,
            Self::PermissionError => StatusCode::FORBIDDEN,
            Self::NotFoundError => StatusCode::NOT_FOUND,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    /// Membership error kind, when the failure came from the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status: error_type.status(),
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    code: None,
                },
            },
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorType::InvalidRequestError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorType::AuthenticationError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        let error_type = match err.kind() {
            MembershipErrorKind::NotFound => ApiErrorType::NotFoundError,
            MembershipErrorKind::Forbidden => ApiErrorType::PermissionError,
            MembershipErrorKind::Conflict | MembershipErrorKind::Invalid => {
                ApiErrorType::InvalidRequestError
            }
            MembershipErrorKind::Service => ApiErrorType::ServerError,
        };

        Self::new(error_type, err.to_string()).with_code(err.kind().as_str())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.response.error.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::team::SERVICE_ERROR_MESSAGE;

    #[test]
    fn test_membership_error_mapping() {
        let cases = [
            (MembershipError::not_found("Team not found"), StatusCode::NOT_FOUND),
            (MembershipError::forbidden("nope"), StatusCode::FORBIDDEN),
            (MembershipError::conflict("taken"), StatusCode::BAD_REQUEST),
            (MembershipError::invalid("bad"), StatusCode::BAD_REQUEST),
            (MembershipError::Service, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let api_err: ApiError = err.into();
            assert_eq!(api_err.status, status);
        }
    }

    #[test]
    fn test_conflict_carries_code() {
        let api_err: ApiError = MembershipError::conflict("User is already a member").into();

        assert_eq!(api_err.response.error.code.as_deref(), Some("conflict"));
        assert_eq!(api_err.response.error.message, "User is already a member");
    }

    #[test]
    fn test_service_error_message_is_fixed() {
        let api_err: ApiError = MembershipError::Service.into();
        let json = serde_json::to_string(&api_err.response).unwrap();

        assert!(json.contains(SERVICE_ERROR_MESSAGE));
        assert!(json.contains("server_error"));
    }

    #[test]
    fn test_status_follows_membership_status_code() {
        for err in [
            MembershipError::not_found("x"),
            MembershipError::forbidden("x"),
            MembershipError::conflict("x"),
            MembershipError::invalid("x"),
            MembershipError::Service,
        ] {
            let expected = err.status_code();
            let api_err: ApiError = err.into();
            assert_eq!(api_err.status.as_u16(), expected);
        }
    }
}
