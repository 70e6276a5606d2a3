//! HTTP request, response and error types

pub mod error;
pub mod json;
pub mod teams;

pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use teams::{
    AttachBillingRequest, ChangePlanRequest, CreateTeamRequest, InviteMemberRequest,
    ListInvitationsResponse, ListTeamsResponse, RegisterUserRequest, RenameTeamRequest,
    UpdateRoleRequest,
};
