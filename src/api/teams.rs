//! Team, invitation and member endpoints

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use tracing::debug;

use crate::api::middleware::RequireCaller;
use crate::api::state::AppState;
use crate::api::types::{
    ApiError, AttachBillingRequest, ChangePlanRequest, CreateTeamRequest, InviteMemberRequest,
    Json, ListInvitationsResponse, ListTeamsResponse, RegisterUserRequest, RenameTeamRequest,
    UpdateRoleRequest,
};
use crate::domain::ids::{MembershipId, TeamId, UserId};
use crate::domain::membership::TeamMember;
use crate::domain::subscription::TeamSubscription;
use crate::domain::team::Team;
use crate::domain::user::User;
use crate::infrastructure::team::{AcceptedInvitation, TeamDetails};

pub fn create_membership_router() -> Router<AppState> {
    Router::new()
        .route("/users", post(register_user))
        .route("/teams", post(create_team).get(list_teams))
        .route("/teams/{team_id}", get(get_team).patch(rename_team))
        .route("/teams/{team_id}/plan", put(change_plan))
        .route("/teams/{team_id}/billing", put(attach_billing))
        .route("/teams/{team_id}/invitations", post(invite_member))
        .route(
            "/teams/{team_id}/members/{user_id}",
            delete(remove_member),
        )
        .route(
            "/teams/{team_id}/members/{user_id}/role",
            put(update_member_role),
        )
        .route("/invitations", get(list_invitations))
        .route(
            "/invitations/{invitation_id}/accept",
            post(accept_invitation),
        )
}

fn parse_id<T: FromStr>(value: &str, what: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid {} '{}'", what, value)))
}

/// POST /users
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .membership
        .register_user(&request.email, request.name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /teams
pub async fn create_team(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Json(request): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamDetails>), ApiError> {
    debug!(owner_id = %caller, name = %request.name, "Creating team");

    let details = state
        .membership
        .create_team(&request.name, caller, request.plan.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

/// GET /teams
pub async fn list_teams(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ListTeamsResponse>, ApiError> {
    let teams = state.membership.list_teams_for_user(caller).await?;
    Ok(Json(teams.into()))
}

/// GET /teams/{team_id}
pub async fn get_team(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(team_id): Path<String>,
) -> Result<Json<TeamDetails>, ApiError> {
    let team_id: TeamId = parse_id(&team_id, "team id")?;
    let details = state.membership.get_team(team_id, caller).await?;

    Ok(Json(details))
}

/// PATCH /teams/{team_id}
pub async fn rename_team(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(team_id): Path<String>,
    Json(request): Json<RenameTeamRequest>,
) -> Result<Json<Team>, ApiError> {
    let team_id: TeamId = parse_id(&team_id, "team id")?;
    let team = state
        .membership
        .rename_team(team_id, &request.name, caller)
        .await?;

    Ok(Json(team))
}

/// PUT /teams/{team_id}/plan
pub async fn change_plan(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(team_id): Path<String>,
    Json(request): Json<ChangePlanRequest>,
) -> Result<Json<TeamSubscription>, ApiError> {
    let team_id: TeamId = parse_id(&team_id, "team id")?;
    debug!(team_id = %team_id, plan = %request.plan, "Changing plan");

    let subscription = state
        .membership
        .change_plan(team_id, &request.plan, caller)
        .await?;

    Ok(Json(subscription))
}

/// PUT /teams/{team_id}/billing
pub async fn attach_billing(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(team_id): Path<String>,
    Json(request): Json<AttachBillingRequest>,
) -> Result<Json<TeamSubscription>, ApiError> {
    let team_id: TeamId = parse_id(&team_id, "team id")?;
    let subscription = state
        .membership
        .attach_billing_subscription(team_id, &request.billing_subscription_id, caller)
        .await?;

    Ok(Json(subscription))
}

/// POST /teams/{team_id}/invitations
pub async fn invite_member(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(team_id): Path<String>,
    Json(request): Json<InviteMemberRequest>,
) -> Result<(StatusCode, Json<TeamMember>), ApiError> {
    let team_id: TeamId = parse_id(&team_id, "team id")?;
    debug!(team_id = %team_id, role = %request.role, "Inviting member");

    let invitation = state
        .membership
        .invite_member(&request.email, request.role, team_id, caller)
        .await?;

    Ok((StatusCode::CREATED, Json(invitation)))
}

/// GET /invitations
pub async fn list_invitations(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ListInvitationsResponse>, ApiError> {
    let invitations = state.membership.list_pending_invitations(caller).await?;
    Ok(Json(invitations.into()))
}

/// POST /invitations/{invitation_id}/accept
pub async fn accept_invitation(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(invitation_id): Path<String>,
) -> Result<Json<AcceptedInvitation>, ApiError> {
    let invitation_id: MembershipId = parse_id(&invitation_id, "invitation id")?;
    let accepted = state
        .membership
        .accept_invitation(invitation_id, caller)
        .await?;

    Ok(Json(accepted))
}

/// PUT /teams/{team_id}/members/{user_id}/role
pub async fn update_member_role(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path((team_id, user_id)): Path<(String, String)>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<TeamMember>, ApiError> {
    let team_id: TeamId = parse_id(&team_id, "team id")?;
    let user_id: UserId = parse_id(&user_id, "user id")?;

    let member = state
        .membership
        .update_member_role(team_id, user_id, request.role, caller)
        .await?;

    Ok(Json(member))
}

/// DELETE /teams/{team_id}/members/{user_id}
pub async fn remove_member(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path((team_id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let team_id: TeamId = parse_id(&team_id, "team id")?;
    let user_id: UserId = parse_id(&user_id, "user id")?;

    state
        .membership
        .remove_member(team_id, user_id, caller)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
