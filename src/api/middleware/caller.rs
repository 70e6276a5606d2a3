//! Caller identification
//!
//! Authentication happens upstream; the gateway forwards the resolved user
//! id in the `X-User-Id` header.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::api::types::ApiError;
use crate::domain::ids::UserId;

pub const CALLER_HEADER: &str = "x-user-id";

/// Extractor that requires a well-formed `X-User-Id` header
#[derive(Debug, Clone, Copy)]
pub struct RequireCaller(pub UserId);

impl<S> FromRequestParts<S> for RequireCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_caller(&parts.headers).map(RequireCaller)
    }
}

pub fn extract_caller(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get(CALLER_HEADER)
        .ok_or_else(|| ApiError::unauthorized("Missing 'X-User-Id' header"))?;

    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid 'X-User-Id' header encoding"))?;

    UserId::parse(value.trim())
        .map_err(|_| ApiError::unauthorized("'X-User-Id' must be a UUID"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn test_extracts_user_id() {
        let id = UserId::generate();
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());

        assert_eq!(extract_caller(&headers).unwrap(), id);
    }

    #[test]
    fn test_missing_header() {
        let err = extract_caller(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_malformed_header() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_HEADER, HeaderValue::from_static("alice"));

        let err = extract_caller(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
