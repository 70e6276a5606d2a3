//! Team membership service: teams, invitations, roles and seats

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::error::MembershipError;
use crate::domain::billing::{BillingProvider, NewBillingCustomer};
use crate::domain::ids::{MembershipId, TeamId, UserId};
use crate::domain::membership::{MemberStatus, MembershipRepository, TeamMember};
use crate::domain::notification::{InvitationNotifier, TeamInvitationNotice};
use crate::domain::subscription::{PlanCatalog, SubscriptionRepository, TeamSubscription};
use crate::domain::team::{
    slug_candidates, slugify, validate_team_name, Team, TeamRepository, TeamRole,
};
use crate::domain::unit_of_work::UnitOfWork;
use crate::domain::user::{validate_display_name, User, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_membership_event;

/// Default lifetime of an invitation
pub const DEFAULT_INVITATION_TTL_DAYS: i64 = 7;

/// Collaborators the service works against
#[derive(Clone)]
pub struct TeamMembershipDeps {
    pub users: Arc<dyn UserRepository>,
    pub teams: Arc<dyn TeamRepository>,
    pub members: Arc<dyn MembershipRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
    pub billing: Arc<dyn BillingProvider>,
    pub notifier: Arc<dyn InvitationNotifier>,
}

/// Tunables for the membership rules
#[derive(Debug, Clone)]
pub struct MembershipSettings {
    pub plans: PlanCatalog,
    pub invitation_ttl: Duration,
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            plans: PlanCatalog::default(),
            invitation_ttl: Duration::days(DEFAULT_INVITATION_TTL_DAYS),
        }
    }
}

/// A team together with its members and subscription
#[derive(Debug, Clone, Serialize)]
pub struct TeamDetails {
    pub team: Team,
    pub members: Vec<TeamMember>,
    pub subscription: TeamSubscription,
}

/// Result of a successful acceptance
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedInvitation {
    pub member: TeamMember,
    pub team: Team,
}

/// An open invitation addressed to a user
#[derive(Debug, Clone, Serialize)]
pub struct PendingInvitation {
    pub invitation: TeamMember,
    pub team: Team,
}

/// Owns team creation, invitations, acceptance, role changes and removal
pub struct TeamMembershipService {
    deps: TeamMembershipDeps,
    settings: MembershipSettings,
}

impl std::fmt::Debug for TeamMembershipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamMembershipService")
            .field("settings", &self.settings)
            .finish()
    }
}

fn storage(operation: &'static str) -> impl FnOnce(DomainError) -> MembershipError {
    move |e| MembershipError::unexpected(operation, e)
}

fn authorize_removal(actor: &TeamMember, target: &TeamMember) -> Result<(), MembershipError> {
    if !actor.role().can_manage_members() {
        return Err(MembershipError::forbidden(
            "Only owners and admins can remove members",
        ));
    }
    if target.is_owner() {
        return Err(MembershipError::forbidden("The team owner cannot be removed"));
    }
    if !actor.role().can_remove(&target.role()) {
        return Err(MembershipError::forbidden(
            "Admins cannot remove other admins",
        ));
    }
    Ok(())
}

fn authorize_role_change(actor: &TeamMember, target: &TeamMember) -> Result<(), MembershipError> {
    if !actor.role().can_change_roles() {
        return Err(MembershipError::forbidden(
            "Only the team owner can change roles",
        ));
    }
    if target.is_owner() {
        return Err(MembershipError::forbidden(
            "The owner's role cannot be changed",
        ));
    }
    Ok(())
}

impl TeamMembershipService {
    pub fn new(deps: TeamMembershipDeps, settings: MembershipSettings) -> Self {
        Self { deps, settings }
    }

    pub fn settings(&self) -> &MembershipSettings {
        &self.settings
    }

    /// Create a team owned by `owner_id`
    ///
    /// The team row, the owner's membership and the subscription are written
    /// in one unit of work after a billing customer has been registered.
    #[instrument(skip(self, name), fields(owner_id = %owner_id))]
    pub async fn create_team(
        &self,
        name: &str,
        owner_id: UserId,
        plan: Option<&str>,
    ) -> Result<TeamDetails, MembershipError> {
        const OP: &str = "create_team";

        let name = name.trim();
        validate_team_name(name)
            .map_err(|e| MembershipError::invalid(e.to_string()))?;

        let plan = plan.unwrap_or(self.settings.plans.default_plan());
        let max_seats = self
            .settings
            .plans
            .max_seats(plan)
            .ok_or_else(|| MembershipError::invalid(format!("Unknown plan '{}'", plan)))?;

        let owner = self
            .deps
            .users
            .get(&owner_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Owner not found"))?;

        let slug = self.unique_slug(name).await?;
        debug!(slug = %slug, "Resolved team slug");

        let customer = self
            .deps
            .billing
            .create_customer(
                NewBillingCustomer::new(name, owner.email())
                    .with_metadata("team_slug", slug.as_str())
                    .with_metadata("owner_id", owner_id.to_string()),
            )
            .await
            .map_err(storage(OP))?;

        let now = Utc::now();
        let team = Team::new(name, slug, owner_id, plan)
            .map_err(|e| MembershipError::invalid(e.to_string()))?
            .with_billing_customer(customer.id);
        let owner_member = TeamMember::owner(team.id(), owner_id, now);
        let subscription = TeamSubscription::new(team.id(), plan, max_seats);

        let mut tx = self.deps.unit_of_work.begin().await.map_err(storage(OP))?;
        // A slug taken since the availability check lands here as well
        tx.insert_team(&team).await.map_err(storage(OP))?;
        tx.insert_member(&owner_member).await.map_err(storage(OP))?;
        tx.insert_subscription(&subscription)
            .await
            .map_err(storage(OP))?;
        tx.commit().await.map_err(storage(OP))?;

        info!(team_id = %team.id(), slug = %team.slug(), plan, "Created team");
        record_membership_event("team_created");

        Ok(TeamDetails {
            team,
            members: vec![owner_member],
            subscription,
        })
    }

    async fn unique_slug(&self, name: &str) -> Result<String, MembershipError> {
        let base = slugify(name);

        for candidate in slug_candidates(&base) {
            let taken = self
                .deps
                .teams
                .slug_exists(&candidate)
                .await
                .map_err(storage("create_team"))?;

            if !taken {
                return Ok(candidate);
            }
        }

        // slug_candidates never ends
        Err(MembershipError::Service)
    }

    /// Invite `email` into a team with `role`
    #[instrument(skip(self, email), fields(team_id = %team_id, invited_by = %invited_by, role = %role))]
    pub async fn invite_member(
        &self,
        email: &str,
        role: TeamRole,
        team_id: TeamId,
        invited_by: UserId,
    ) -> Result<TeamMember, MembershipError> {
        const OP: &str = "invite_member";

        let inviter = self.active_member(team_id, invited_by, OP).await?;
        if !inviter.role().can_manage_members() {
            return Err(MembershipError::forbidden(
                "Only owners and admins can invite members",
            ));
        }

        if !role.is_assignable() {
            return Err(MembershipError::invalid(
                "Ownership cannot be granted through an invitation",
            ));
        }

        let candidate = User::new(email).map_err(|e| MembershipError::invalid(e.to_string()))?;
        let invitee = self
            .deps
            .users
            .upsert_by_email(candidate)
            .await
            .map_err(storage(OP))?;

        let existing = self
            .deps
            .members
            .find(&team_id, &invitee.id())
            .await
            .map_err(storage(OP))?;

        match existing.as_ref().map(TeamMember::status) {
            Some(MemberStatus::Active) => {
                return Err(MembershipError::conflict(
                    "User is already a member of this team",
                ));
            }
            Some(MemberStatus::Pending) => {
                return Err(MembershipError::conflict(
                    "An invitation has already been sent to this user",
                ));
            }
            Some(MemberStatus::Suspended) | None => {}
        }

        let team = self.team(team_id, OP).await?;
        let expires_at = Utc::now() + self.settings.invitation_ttl;

        let mut tx = self.deps.unit_of_work.begin().await.map_err(storage(OP))?;
        let subscription = tx
            .lock_subscription(&team_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Team subscription not found"))?;
        let active = tx
            .count_active_members(&team_id)
            .await
            .map_err(storage(OP))?;

        if !subscription.admits(active) {
            return Err(MembershipError::conflict(format!(
                "All {} seats on the current plan are in use",
                subscription.max_seats()
            )));
        }

        let invitation = match existing {
            Some(mut suspended) => {
                suspended.reinvite(role, invited_by, expires_at);
                tx.update_member(&suspended).await.map_err(storage(OP))?;
                suspended
            }
            None => {
                let invitation =
                    TeamMember::invitation(team_id, invitee.id(), role, invited_by, expires_at);
                tx.insert_member(&invitation).await.map_err(|e| {
                    if e.is_conflict() {
                        MembershipError::conflict(
                            "An invitation has already been sent to this user",
                        )
                    } else {
                        MembershipError::unexpected(OP, e)
                    }
                })?;
                invitation
            }
        };
        tx.commit().await.map_err(storage(OP))?;

        info!(
            invitation_id = %invitation.id(),
            user_id = %invitee.id(),
            "Created invitation"
        );
        record_membership_event("invitation_sent");

        let inviter_name = self
            .deps
            .users
            .get(&invited_by)
            .await
            .map_err(storage(OP))?
            .and_then(|u| u.name().map(str::to_string));

        let notice = TeamInvitationNotice::new(
            invitee.email(),
            team.name(),
            invitation.id(),
            inviter_name.as_deref(),
        );
        self.deps
            .notifier
            .send_team_invitation(notice)
            .await
            .map_err(storage(OP))?;

        Ok(invitation)
    }

    /// Accept a pending invitation on behalf of `user_id`
    #[instrument(skip(self), fields(invitation_id = %invitation_id, user_id = %user_id))]
    pub async fn accept_invitation(
        &self,
        invitation_id: MembershipId,
        user_id: UserId,
    ) -> Result<AcceptedInvitation, MembershipError> {
        const OP: &str = "accept_invitation";

        let invitation = self
            .deps
            .members
            .get(&invitation_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Invitation not found"))?;

        if invitation.user_id() != user_id {
            return Err(MembershipError::forbidden(
                "This invitation is for a different user",
            ));
        }
        if !invitation.is_pending() {
            return Err(MembershipError::conflict("This invitation is no longer valid"));
        }

        let now = Utc::now();
        if invitation.is_expired_at(now) {
            return Err(MembershipError::conflict("This invitation has expired"));
        }

        let team_id = invitation.team_id();
        let mut tx = self.deps.unit_of_work.begin().await.map_err(storage(OP))?;
        let mut subscription = tx
            .lock_subscription(&team_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Team subscription not found"))?;

        // Re-read under the lock; a concurrent accept or removal may have won
        let mut member = tx
            .get_member(&invitation_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Invitation not found"))?;
        if !member.is_pending() {
            return Err(MembershipError::conflict("This invitation is no longer valid"));
        }

        let active = tx
            .count_active_members(&team_id)
            .await
            .map_err(storage(OP))?;
        if !subscription.admits(active) {
            return Err(MembershipError::conflict(format!(
                "All {} seats on the current plan are in use",
                subscription.max_seats()
            )));
        }

        member.activate(now);
        subscription.set_seats(subscription.seats() + 1);
        tx.update_member(&member).await.map_err(storage(OP))?;
        tx.update_subscription(&subscription)
            .await
            .map_err(storage(OP))?;
        tx.commit().await.map_err(storage(OP))?;

        info!(team_id = %team_id, seats = subscription.seats(), "Accepted invitation");
        record_membership_event("invitation_accepted");

        let team = self.team(team_id, OP).await?;
        Ok(AcceptedInvitation { member, team })
    }

    /// Remove `user_id` from a team, or revoke their pending invitation
    #[instrument(skip(self), fields(team_id = %team_id, user_id = %user_id, removed_by = %removed_by))]
    pub async fn remove_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
        removed_by: UserId,
    ) -> Result<(), MembershipError> {
        const OP: &str = "remove_member";

        self.team(team_id, OP).await?;
        let actor = self.active_member(team_id, removed_by, OP).await?;
        let target = self.target_member(team_id, user_id, OP).await?;
        authorize_removal(&actor, &target)?;

        let mut tx = self.deps.unit_of_work.begin().await.map_err(storage(OP))?;
        let mut subscription = tx
            .lock_subscription(&team_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Team subscription not found"))?;

        // Roles may have moved since the first read; decide again on the locked rows
        let actor = tx
            .get_member(&actor.id())
            .await
            .map_err(storage(OP))?
            .filter(TeamMember::is_active)
            .ok_or_else(|| MembershipError::forbidden("You are not a member of this team"))?;
        let current = tx
            .get_member(&target.id())
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Member not found"))?;
        authorize_removal(&actor, &current)?;
        tx.delete_member(&current.id()).await.map_err(storage(OP))?;

        let held_seat = current.is_active();
        if held_seat {
            subscription.set_seats(subscription.seats().saturating_sub(1));
            tx.update_subscription(&subscription)
                .await
                .map_err(storage(OP))?;
        }
        tx.commit().await.map_err(storage(OP))?;

        info!(status = %current.status(), seats = subscription.seats(), "Removed member");
        record_membership_event("member_removed");

        if held_seat {
            if let Some(billing_id) = subscription.billing_subscription_id() {
                self.deps
                    .billing
                    .update_subscription_quantity(billing_id, subscription.seats())
                    .await
                    .map_err(|e| {
                        warn!(billing_subscription_id = billing_id, "Seat sync failed after removal");
                        MembershipError::unexpected(OP, e)
                    })?;
            }
        }

        Ok(())
    }

    /// Change the role of a non-owner member; owner only
    #[instrument(skip(self), fields(team_id = %team_id, user_id = %user_id, role = %new_role))]
    pub async fn update_member_role(
        &self,
        team_id: TeamId,
        user_id: UserId,
        new_role: TeamRole,
        updated_by: UserId,
    ) -> Result<TeamMember, MembershipError> {
        const OP: &str = "update_member_role";

        self.team(team_id, OP).await?;
        let actor = self.active_member(team_id, updated_by, OP).await?;
        let target = self.target_member(team_id, user_id, OP).await?;
        if !target.is_active() {
            return Err(MembershipError::not_found("Member not found"));
        }
        authorize_role_change(&actor, &target)?;
        if !new_role.is_assignable() {
            return Err(MembershipError::invalid(
                "Ownership cannot be granted through a role change",
            ));
        }

        // Ordered behind removals and acceptances on the same team
        let mut tx = self.deps.unit_of_work.begin().await.map_err(storage(OP))?;
        tx.lock_subscription(&team_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Team subscription not found"))?;

        let actor = tx
            .get_member(&actor.id())
            .await
            .map_err(storage(OP))?
            .filter(TeamMember::is_active)
            .ok_or_else(|| MembershipError::forbidden("You are not a member of this team"))?;
        let mut updated = tx
            .get_member(&target.id())
            .await
            .map_err(storage(OP))?
            .filter(TeamMember::is_active)
            .ok_or_else(|| MembershipError::not_found("Member not found"))?;
        authorize_role_change(&actor, &updated)?;

        updated.set_role(new_role);
        tx.update_member(&updated).await.map_err(storage(OP))?;
        tx.commit().await.map_err(storage(OP))?;

        info!("Updated member role");
        Ok(updated)
    }

    /// Team with members and subscription; the requester must be an active member
    pub async fn get_team(
        &self,
        team_id: TeamId,
        requested_by: UserId,
    ) -> Result<TeamDetails, MembershipError> {
        const OP: &str = "get_team";

        let team = self.team(team_id, OP).await?;
        self.active_member(team_id, requested_by, OP).await?;

        let members = self
            .deps
            .members
            .list_for_team(&team_id)
            .await
            .map_err(storage(OP))?;
        let subscription = self
            .deps
            .subscriptions
            .get(&team_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Team subscription not found"))?;

        Ok(TeamDetails {
            team,
            members,
            subscription,
        })
    }

    /// Teams in which the user holds an active membership
    pub async fn list_teams_for_user(&self, user_id: UserId) -> Result<Vec<Team>, MembershipError> {
        const OP: &str = "list_teams_for_user";

        let memberships = self
            .deps
            .members
            .list_for_user(&user_id)
            .await
            .map_err(storage(OP))?;

        let mut teams = Vec::new();
        for membership in memberships.iter().filter(|m| m.is_active()) {
            if let Some(team) = self
                .deps
                .teams
                .get(&membership.team_id())
                .await
                .map_err(storage(OP))?
            {
                teams.push(team);
            }
        }

        Ok(teams)
    }

    /// Unexpired pending invitations addressed to the user
    pub async fn list_pending_invitations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PendingInvitation>, MembershipError> {
        const OP: &str = "list_pending_invitations";

        let now = Utc::now();
        let memberships = self
            .deps
            .members
            .list_for_user(&user_id)
            .await
            .map_err(storage(OP))?;

        let mut pending = Vec::new();
        for invitation in memberships
            .into_iter()
            .filter(|m| m.is_pending() && !m.is_expired_at(now))
        {
            if let Some(team) = self
                .deps
                .teams
                .get(&invitation.team_id())
                .await
                .map_err(storage(OP))?
            {
                pending.push(PendingInvitation { invitation, team });
            }
        }

        Ok(pending)
    }

    /// Rename a team; the slug stays as it was
    #[instrument(skip(self, name), fields(team_id = %team_id))]
    pub async fn rename_team(
        &self,
        team_id: TeamId,
        name: &str,
        updated_by: UserId,
    ) -> Result<Team, MembershipError> {
        const OP: &str = "rename_team";

        let mut team = self.team(team_id, OP).await?;
        let actor = self.active_member(team_id, updated_by, OP).await?;
        if !actor.role().can_manage_members() {
            return Err(MembershipError::forbidden(
                "Only owners and admins can rename the team",
            ));
        }

        team.set_name(name.trim())
            .map_err(|e| MembershipError::invalid(e.to_string()))?;
        let team = self.deps.teams.update(team).await.map_err(storage(OP))?;

        info!(name = %team.name(), "Renamed team");
        Ok(team)
    }

    /// Move a team to another plan; owner only
    #[instrument(skip(self), fields(team_id = %team_id))]
    pub async fn change_plan(
        &self,
        team_id: TeamId,
        plan: &str,
        updated_by: UserId,
    ) -> Result<TeamSubscription, MembershipError> {
        const OP: &str = "change_plan";

        let mut team = self.team(team_id, OP).await?;
        let actor = self.active_member(team_id, updated_by, OP).await?;
        if !actor.is_owner() {
            return Err(MembershipError::forbidden(
                "Only the team owner can change the plan",
            ));
        }

        let max_seats = self
            .settings
            .plans
            .max_seats(plan)
            .ok_or_else(|| MembershipError::invalid(format!("Unknown plan '{}'", plan)))?;

        let mut tx = self.deps.unit_of_work.begin().await.map_err(storage(OP))?;
        let mut subscription = tx
            .lock_subscription(&team_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Team subscription not found"))?;
        let active = tx
            .count_active_members(&team_id)
            .await
            .map_err(storage(OP))?;

        if max_seats < active {
            return Err(MembershipError::conflict(format!(
                "Plan '{}' allows {} seats but {} are in use",
                plan, max_seats, active
            )));
        }

        subscription.change_plan(plan, max_seats);
        team.set_plan(plan);
        tx.update_subscription(&subscription)
            .await
            .map_err(storage(OP))?;
        tx.update_team(&team).await.map_err(storage(OP))?;
        tx.commit().await.map_err(storage(OP))?;

        info!(plan, max_seats, "Changed plan");
        Ok(subscription)
    }

    /// Link the team to a subscription at the billing provider; owner only
    ///
    /// The provider's quantity is synced to the current seat count.
    #[instrument(skip(self), fields(team_id = %team_id))]
    pub async fn attach_billing_subscription(
        &self,
        team_id: TeamId,
        billing_subscription_id: &str,
        updated_by: UserId,
    ) -> Result<TeamSubscription, MembershipError> {
        const OP: &str = "attach_billing_subscription";

        let billing_subscription_id = billing_subscription_id.trim();
        if billing_subscription_id.is_empty() {
            return Err(MembershipError::invalid(
                "Billing subscription id cannot be empty",
            ));
        }

        self.team(team_id, OP).await?;
        let actor = self.active_member(team_id, updated_by, OP).await?;
        if !actor.is_owner() {
            return Err(MembershipError::forbidden(
                "Only the team owner can manage billing",
            ));
        }

        let mut tx = self.deps.unit_of_work.begin().await.map_err(storage(OP))?;
        let mut subscription = tx
            .lock_subscription(&team_id)
            .await
            .map_err(storage(OP))?
            .ok_or_else(|| MembershipError::not_found("Team subscription not found"))?;
        subscription.set_billing_subscription_id(billing_subscription_id);
        tx.update_subscription(&subscription)
            .await
            .map_err(storage(OP))?;
        tx.commit().await.map_err(storage(OP))?;

        self.deps
            .billing
            .update_subscription_quantity(billing_subscription_id, subscription.seats())
            .await
            .map_err(storage(OP))?;

        info!(billing_subscription_id, "Attached billing subscription");
        Ok(subscription)
    }

    /// Resolve-or-create a user by email
    pub async fn register_user(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<User, MembershipError> {
        let mut candidate =
            User::new(email).map_err(|e| MembershipError::invalid(e.to_string()))?;

        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            validate_display_name(name).map_err(|e| MembershipError::invalid(e.to_string()))?;
            candidate = candidate.with_name(name);
        }

        self.deps
            .users
            .upsert_by_email(candidate)
            .await
            .map_err(storage("register_user"))
    }

    async fn team(&self, team_id: TeamId, operation: &'static str) -> Result<Team, MembershipError> {
        self.deps
            .teams
            .get(&team_id)
            .await
            .map_err(storage(operation))?
            .ok_or_else(|| MembershipError::not_found("Team not found"))
    }

    /// The caller's membership; anything but an active row is treated as absent
    async fn active_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
        operation: &'static str,
    ) -> Result<TeamMember, MembershipError> {
        self.deps
            .members
            .find(&team_id, &user_id)
            .await
            .map_err(storage(operation))?
            .filter(TeamMember::is_active)
            .ok_or_else(|| MembershipError::forbidden("You are not a member of this team"))
    }

    async fn target_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
        operation: &'static str,
    ) -> Result<TeamMember, MembershipError> {
        self.deps
            .members
            .find(&team_id, &user_id)
            .await
            .map_err(storage(operation))?
            .ok_or_else(|| MembershipError::not_found("Member not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{BillingCustomer, MockBillingProvider};
    use crate::domain::membership::MockMembershipRepository;
    use crate::domain::notification::MockInvitationNotifier;
    use crate::domain::subscription::MockSubscriptionRepository;
    use crate::domain::team::MockTeamRepository;
    use crate::domain::user::MockUserRepository;
    use crate::infrastructure::storage::InMemoryStore;
    use crate::infrastructure::team::MembershipErrorKind;

    struct Harness {
        service: Arc<TeamMembershipService>,
        store: InMemoryStore,
    }

    fn permissive_billing() -> MockBillingProvider {
        let mut billing = MockBillingProvider::new();
        billing
            .expect_create_customer()
            .returning(|_| Ok(BillingCustomer { id: "cus_test".to_string() }));
        billing
            .expect_update_subscription_quantity()
            .returning(|_, _| Ok(()));
        billing
    }

    fn permissive_notifier() -> MockInvitationNotifier {
        let mut notifier = MockInvitationNotifier::new();
        notifier.expect_send_team_invitation().returning(|_| Ok(()));
        notifier
    }

    fn harness_with(billing: MockBillingProvider, notifier: MockInvitationNotifier) -> Harness {
        let store = InMemoryStore::new();
        let store_arc = Arc::new(store.clone());
        let deps = TeamMembershipDeps {
            users: store_arc.clone(),
            teams: store_arc.clone(),
            members: store_arc.clone(),
            subscriptions: store_arc.clone(),
            unit_of_work: store_arc,
            billing: Arc::new(billing),
            notifier: Arc::new(notifier),
        };

        Harness {
            service: Arc::new(TeamMembershipService::new(
                deps,
                MembershipSettings::default(),
            )),
            store,
        }
    }

    fn harness() -> Harness {
        harness_with(permissive_billing(), permissive_notifier())
    }

    impl Harness {
        async fn user(&self, email: &str) -> User {
            self.service.register_user(email, None).await.unwrap()
        }

        async fn team(&self, name: &str, owner: &User) -> Team {
            self.service
                .create_team(name, owner.id(), None)
                .await
                .unwrap()
                .team
        }

        /// Invite and accept in one go
        async fn join(&self, team: &Team, inviter: &User, email: &str, role: TeamRole) -> User {
            let invitation = self
                .service
                .invite_member(email, role, team.id(), inviter.id())
                .await
                .unwrap();
            self.service
                .accept_invitation(invitation.id(), invitation.user_id())
                .await
                .unwrap();
            self.store.get_by_email(email).await.unwrap().unwrap()
        }

        async fn subscription(&self, team: &Team) -> TeamSubscription {
            SubscriptionRepository::get(&self.store, &team.id())
                .await
                .unwrap()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_acme_scenario() {
        let h = harness();
        let u1 = h.user("u1@acme.com").await;

        let details = h
            .service
            .create_team("Acme Inc", u1.id(), Some("free"))
            .await
            .unwrap();
        assert_eq!(details.team.slug(), "acme-inc");
        assert_eq!(details.members.len(), 1);
        assert!(details.members[0].is_owner());
        assert!(details.members[0].is_active());
        assert_eq!(details.subscription.seats(), 1);
        assert_eq!(details.subscription.max_seats(), 5);

        let team = details.team;
        let invitation = h
            .service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), u1.id())
            .await
            .unwrap();
        assert!(invitation.is_pending());
        let ttl = invitation.expires_at().unwrap() - Utc::now();
        assert!(ttl > Duration::days(7) - Duration::minutes(1));
        assert!(ttl <= Duration::days(7));

        let accepted = h
            .service
            .accept_invitation(invitation.id(), invitation.user_id())
            .await
            .unwrap();
        assert!(accepted.member.is_active());
        assert!(accepted.member.joined_at().is_some());
        assert!(accepted.member.expires_at().is_none());
        assert_eq!(accepted.team.id(), team.id());
        assert_eq!(h.subscription(&team).await.seats(), 2);

        let err = h
            .service
            .remove_member(team.id(), u1.id(), u1.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);

        let bob = invitation.user_id();
        let promoted = h
            .service
            .update_member_role(team.id(), bob, TeamRole::Admin, u1.id())
            .await
            .unwrap();
        assert_eq!(promoted.role(), TeamRole::Admin);

        let err = h
            .service
            .remove_member(team.id(), u1.id(), bob)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);

        let owners: Vec<_> = h
            .store
            .list_for_team(&team.id())
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.is_owner() && m.is_active())
            .collect();
        assert_eq!(owners.len(), 1);
    }

    #[tokio::test]
    async fn test_slug_collision_appends_suffix() {
        let h = harness();
        let owner = h.user("owner@x.com").await;

        let first = h.team("Acme", &owner).await;
        let second = h.team("Acme", &owner).await;
        let third = h.team("ACME!", &owner).await;

        assert_eq!(first.slug(), "acme");
        assert_eq!(second.slug(), "acme-1");
        assert_eq!(third.slug(), "acme-2");
    }

    #[tokio::test]
    async fn test_create_team_registers_billing_customer() {
        let mut billing = MockBillingProvider::new();
        billing
            .expect_create_customer()
            .withf(|c| {
                c.name == "Acme Inc"
                    && c.email == "owner@x.com"
                    && c.metadata.get("team_slug").map(String::as_str) == Some("acme-inc")
                    && c.metadata.contains_key("owner_id")
            })
            .times(1)
            .returning(|_| Ok(BillingCustomer { id: "cus_123".to_string() }));
        let h = harness_with(billing, permissive_notifier());
        let owner = h.user("owner@x.com").await;

        let team = h.team("Acme Inc", &owner).await;

        assert_eq!(team.billing_customer_id(), Some("cus_123"));
    }

    #[tokio::test]
    async fn test_create_team_validation() {
        let h = harness();
        let owner = h.user("owner@x.com").await;

        let err = h.service.create_team("   ", owner.id(), None).await.unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Invalid);

        let err = h
            .service
            .create_team("Acme", owner.id(), Some("platinum"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Invalid);

        let err = h
            .service
            .create_team("Acme", UserId::generate(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_team_billing_failure_is_service_error() {
        let mut billing = MockBillingProvider::new();
        billing
            .expect_create_customer()
            .returning(|_| Err(DomainError::provider("stripe", "card_declined")));
        let h = harness_with(billing, permissive_notifier());
        let owner = h.user("owner@x.com").await;

        let err = h.service.create_team("Acme", owner.id(), None).await.unwrap_err();

        assert_eq!(err, MembershipError::Service);
        assert!(!h.store.slug_exists("acme").await.unwrap());
    }

    #[tokio::test]
    async fn test_slug_taken_inside_transaction_is_service_error() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let first = h.team("Acme", &owner).await;

        // The availability check misses the team created a moment earlier
        let mut teams = MockTeamRepository::new();
        teams.expect_slug_exists().returning(|_| Ok(false));
        let deps = TeamMembershipDeps {
            teams: Arc::new(teams),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());

        let err = service.create_team("Acme", owner.id(), None).await.unwrap_err();

        assert_hidden(err);
        let owned = h.store.list_for_user(&owner.id()).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].team_id(), first.id());
    }

    #[tokio::test]
    async fn test_create_team_with_pro_plan() {
        let h = harness();
        let owner = h.user("owner@x.com").await;

        let details = h
            .service
            .create_team("Acme", owner.id(), Some("pro"))
            .await
            .unwrap();

        assert_eq!(details.team.plan(), "pro");
        assert_eq!(details.subscription.max_seats(), 25);
    }

    #[tokio::test]
    async fn test_seat_admission_at_four_and_five() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;

        for i in 0..3 {
            h.join(&team, &owner, &format!("m{}@x.com", i), TeamRole::Member)
                .await;
        }
        assert_eq!(h.store.count_active(&team.id()).await.unwrap(), 4);

        // 4/5 admits one more
        h.join(&team, &owner, "fifth@x.com", TeamRole::Member).await;
        assert_eq!(h.subscription(&team).await.seats(), 5);

        // 5/5 rejects
        let err = h
            .service
            .invite_member("sixth@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_acceptance_rechecks_quota() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        for i in 0..3 {
            h.join(&team, &owner, &format!("m{}@x.com", i), TeamRole::Member)
                .await;
        }

        // Both invitations issued at 4/5
        let first = h
            .service
            .invite_member("a@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap();
        let second = h
            .service
            .invite_member("b@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap();

        h.service
            .accept_invitation(first.id(), first.user_id())
            .await
            .unwrap();
        let err = h
            .service
            .accept_invitation(second.id(), second.user_id())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), MembershipErrorKind::Conflict);
        let still = MembershipRepository::get(&h.store, &second.id())
            .await
            .unwrap()
            .unwrap();
        assert!(still.is_pending());
        assert_eq!(h.subscription(&team).await.seats(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_invitations_and_acceptances_never_exceed_quota() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        for i in 0..3 {
            h.join(&team, &owner, &format!("m{}@x.com", i), TeamRole::Member)
                .await;
        }

        // 4/5: every invitation is admitted since pending rows hold no seat
        let invites: Vec<_> = (0..4)
            .map(|i| {
                let service = h.service.clone();
                let (team_id, owner_id) = (team.id(), owner.id());
                tokio::spawn(async move {
                    service
                        .invite_member(&format!("c{}@x.com", i), TeamRole::Member, team_id, owner_id)
                        .await
                })
            })
            .collect();

        let mut invitations = Vec::new();
        for handle in invites {
            invitations.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(invitations.len(), 4);
        assert_eq!(h.store.count_active(&team.id()).await.unwrap(), 4);

        let handles: Vec<_> = invitations
            .into_iter()
            .map(|inv| {
                let service = h.service.clone();
                tokio::spawn(async move { service.accept_invitation(inv.id(), inv.user_id()).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(h.store.count_active(&team.id()).await.unwrap(), 5);
        assert_eq!(h.subscription(&team).await.seats(), 5);

        // 5/5: concurrent invitations are all turned away
        let invites: Vec<_> = (0..3)
            .map(|i| {
                let service = h.service.clone();
                let (team_id, owner_id) = (team.id(), owner.id());
                tokio::spawn(async move {
                    service
                        .invite_member(&format!("late{}@x.com", i), TeamRole::Member, team_id, owner_id)
                        .await
                })
            })
            .collect();
        for handle in invites {
            let err = handle.await.unwrap().unwrap_err();
            assert_eq!(err.kind(), MembershipErrorKind::Conflict);
        }
        assert_eq!(h.store.count_active(&team.id()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_reinvite_active_email_conflicts_without_new_user() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let bob = h.join(&team, &owner, "bob@x.com", TeamRole::Member).await;

        for _ in 0..2 {
            let err = h
                .service
                .invite_member("Bob@X.com", TeamRole::Member, team.id(), owner.id())
                .await
                .unwrap_err();
            assert_eq!(
                err,
                MembershipError::conflict("User is already a member of this team")
            );
        }

        let resolved = h.store.get_by_email("bob@x.com").await.unwrap().unwrap();
        assert_eq!(resolved.id(), bob.id());
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation_conflicts() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;

        h.service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap();
        let err = h
            .service
            .invite_member("bob@x.com", TeamRole::Viewer, team.id(), owner.id())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            MembershipError::conflict("An invitation has already been sent to this user")
        );
    }

    #[tokio::test]
    async fn test_suspended_member_can_be_reinvited() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let bob = h.user("bob@x.com").await;

        let suspended = TeamMember::restore(
            MembershipId::generate(),
            team.id(),
            bob.id(),
            TeamRole::Member,
            MemberStatus::Suspended,
            None,
            None,
            Some(Utc::now()),
            Utc::now(),
            Utc::now(),
        );
        let mut tx = h.store.begin().await.unwrap();
        tx.insert_member(&suspended).await.unwrap();
        tx.commit().await.unwrap();

        let invitation = h
            .service
            .invite_member("bob@x.com", TeamRole::Viewer, team.id(), owner.id())
            .await
            .unwrap();

        assert_eq!(invitation.id(), suspended.id());
        assert!(invitation.is_pending());
        assert_eq!(invitation.role(), TeamRole::Viewer);
        assert_eq!(invitation.invited_by(), Some(owner.id()));
        assert!(invitation.expires_at().is_some());
    }

    #[tokio::test]
    async fn test_invite_cannot_grant_owner() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;

        let err = h
            .service
            .invite_member("bob@x.com", TeamRole::Owner, team.id(), owner.id())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), MembershipErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_invite_rejects_invalid_email() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;

        let err = h
            .service
            .invite_member("not-an-email", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), MembershipErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_invitation_notice_contents() {
        let mut notifier = MockInvitationNotifier::new();
        notifier
            .expect_send_team_invitation()
            .withf(|n| {
                n.email == "bob@x.com" && n.team_name == "Acme" && n.inviter_name == "Alice"
            })
            .times(1)
            .returning(|_| Ok(()));
        let h = harness_with(permissive_billing(), notifier);
        let alice = h
            .service
            .register_user("alice@x.com", Some("Alice"))
            .await
            .unwrap();
        let team = h.team("Acme", &alice).await;

        h.service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), alice.id())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invitation_notice_falls_back_to_default_inviter() {
        let mut notifier = MockInvitationNotifier::new();
        notifier
            .expect_send_team_invitation()
            .withf(|n| n.inviter_name == "A team admin")
            .times(1)
            .returning(|_| Ok(()));
        let h = harness_with(permissive_billing(), notifier);
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;

        h.service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_notification_failure_leaves_invitation_pending() {
        let mut notifier = MockInvitationNotifier::new();
        notifier
            .expect_send_team_invitation()
            .returning(|_| Err(DomainError::provider("resend", "rate limited")));
        let h = harness_with(permissive_billing(), notifier);
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;

        let err = h
            .service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::Service);

        // Retrying hits the existing row
        let err = h
            .service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_accept_preconditions() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let invitation = h
            .service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap();

        let err = h
            .service
            .accept_invitation(MembershipId::generate(), invitation.user_id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::NotFound);

        let err = h
            .service
            .accept_invitation(invitation.id(), owner.id())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MembershipError::forbidden("This invitation is for a different user")
        );

        h.service
            .accept_invitation(invitation.id(), invitation.user_id())
            .await
            .unwrap();
        let err = h
            .service
            .accept_invitation(invitation.id(), invitation.user_id())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MembershipError::conflict("This invitation is no longer valid")
        );
    }

    #[tokio::test]
    async fn test_expired_invitation_is_rejected() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let mut invitation = h
            .service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap();

        invitation.set_expires_at(Some(Utc::now() - Duration::hours(1)));
        let mut tx = h.store.begin().await.unwrap();
        tx.update_member(&invitation).await.unwrap();
        tx.commit().await.unwrap();

        let err = h
            .service
            .accept_invitation(invitation.id(), invitation.user_id())
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::conflict("This invitation has expired"));

        let pending = h
            .service
            .list_pending_invitations(invitation.user_id())
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_member_cannot_manage() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let member = h.join(&team, &owner, "m@x.com", TeamRole::Member).await;
        let other = h.join(&team, &owner, "o@x.com", TeamRole::Member).await;

        let err = h
            .service
            .invite_member("new@x.com", TeamRole::Member, team.id(), member.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);

        let err = h
            .service
            .remove_member(team.id(), other.id(), member.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);

        let err = h
            .service
            .update_member_role(team.id(), other.id(), TeamRole::Viewer, member.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_admin_removal_rules() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let admin = h.join(&team, &owner, "admin@x.com", TeamRole::Admin).await;
        let other_admin = h.join(&team, &owner, "admin2@x.com", TeamRole::Admin).await;
        let member = h.join(&team, &owner, "m@x.com", TeamRole::Member).await;

        let err = h
            .service
            .remove_member(team.id(), other_admin.id(), admin.id())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MembershipError::forbidden("Admins cannot remove other admins")
        );

        h.service
            .remove_member(team.id(), member.id(), admin.id())
            .await
            .unwrap();
        assert!(h.store.find(&team.id(), &member.id()).await.unwrap().is_none());
        assert_eq!(h.subscription(&team).await.seats(), 3);

        // Owner may remove an admin
        h.service
            .remove_member(team.id(), other_admin.id(), owner.id())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_preconditions() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let stranger = h.user("stranger@x.com").await;

        let err = h
            .service
            .remove_member(TeamId::generate(), stranger.id(), owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::NotFound);

        let err = h
            .service
            .remove_member(team.id(), owner.id(), stranger.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);

        let err = h
            .service
            .remove_member(team.id(), stranger.id(), owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_revoking_pending_invitation_keeps_seats() {
        let mut billing = MockBillingProvider::new();
        billing
            .expect_create_customer()
            .returning(|_| Ok(BillingCustomer { id: "cus_1".to_string() }));
        billing.expect_update_subscription_quantity().never();
        let h = harness_with(billing, permissive_notifier());
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let invitation = h
            .service
            .invite_member("bob@x.com", TeamRole::Member, team.id(), owner.id())
            .await
            .unwrap();

        let mut subscription = h.subscription(&team).await;
        subscription.set_billing_subscription_id("sub_1");
        SubscriptionRepository::update(&h.store, subscription)
            .await
            .unwrap();

        h.service
            .remove_member(team.id(), invitation.user_id(), owner.id())
            .await
            .unwrap();

        assert_eq!(h.subscription(&team).await.seats(), 1);
    }

    #[tokio::test]
    async fn test_removal_syncs_billing_quantity() {
        let mut billing = MockBillingProvider::new();
        billing
            .expect_create_customer()
            .returning(|_| Ok(BillingCustomer { id: "cus_1".to_string() }));
        billing
            .expect_update_subscription_quantity()
            .withf(|id, quantity| id == "sub_1" && *quantity == 2)
            .times(1)
            .returning(|_, _| Ok(()));
        billing
            .expect_update_subscription_quantity()
            .withf(|id, quantity| id == "sub_1" && *quantity == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        let h = harness_with(billing, permissive_notifier());
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let bob = h.join(&team, &owner, "bob@x.com", TeamRole::Member).await;

        h.service
            .attach_billing_subscription(team.id(), "sub_1", owner.id())
            .await
            .unwrap();
        h.service
            .remove_member(team.id(), bob.id(), owner.id())
            .await
            .unwrap();

        assert_eq!(h.subscription(&team).await.seats(), 1);
    }

    #[tokio::test]
    async fn test_billing_failure_on_removal_keeps_deletion() {
        let mut billing = MockBillingProvider::new();
        billing
            .expect_create_customer()
            .returning(|_| Ok(BillingCustomer { id: "cus_1".to_string() }));
        billing
            .expect_update_subscription_quantity()
            .returning(|_, _| Err(DomainError::provider("stripe", "timeout")));
        let h = harness_with(billing, permissive_notifier());
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let bob = h.join(&team, &owner, "bob@x.com", TeamRole::Member).await;

        let mut subscription = h.subscription(&team).await;
        subscription.set_billing_subscription_id("sub_1");
        SubscriptionRepository::update(&h.store, subscription)
            .await
            .unwrap();

        let err = h
            .service
            .remove_member(team.id(), bob.id(), owner.id())
            .await
            .unwrap_err();

        assert_eq!(err, MembershipError::Service);
        assert!(h.store.find(&team.id(), &bob.id()).await.unwrap().is_none());
        assert_eq!(h.subscription(&team).await.seats(), 1);
    }

    #[tokio::test]
    async fn test_role_change_rules() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let admin = h.join(&team, &owner, "admin@x.com", TeamRole::Admin).await;
        let member = h.join(&team, &owner, "m@x.com", TeamRole::Member).await;

        let err = h
            .service
            .update_member_role(team.id(), member.id(), TeamRole::Viewer, admin.id())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MembershipError::forbidden("Only the team owner can change roles")
        );

        let err = h
            .service
            .update_member_role(team.id(), owner.id(), TeamRole::Admin, owner.id())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MembershipError::forbidden("The owner's role cannot be changed")
        );

        let err = h
            .service
            .update_member_role(team.id(), member.id(), TeamRole::Owner, owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Invalid);

        let err = h
            .service
            .update_member_role(team.id(), UserId::generate(), TeamRole::Viewer, owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::NotFound);

        let updated = h
            .service
            .update_member_role(team.id(), member.id(), TeamRole::Viewer, owner.id())
            .await
            .unwrap();
        assert_eq!(updated.role(), TeamRole::Viewer);
    }

    #[tokio::test]
    async fn test_role_change_ignores_pending_and_suspended_rows() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let invitation = h
            .service
            .invite_member("bob@x.com", TeamRole::Viewer, team.id(), owner.id())
            .await
            .unwrap();

        let err = h
            .service
            .update_member_role(team.id(), invitation.user_id(), TeamRole::Admin, owner.id())
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::not_found("Member not found"));

        let unchanged = MembershipRepository::get(&h.store, &invitation.id())
            .await
            .unwrap()
            .unwrap();
        assert!(unchanged.is_pending());
        assert_eq!(unchanged.role(), TeamRole::Viewer);

        let carol = h.user("carol@x.com").await;
        let suspended = TeamMember::restore(
            MembershipId::generate(),
            team.id(),
            carol.id(),
            TeamRole::Member,
            MemberStatus::Suspended,
            None,
            None,
            Some(Utc::now()),
            Utc::now(),
            Utc::now(),
        );
        let mut tx = h.store.begin().await.unwrap();
        tx.insert_member(&suspended).await.unwrap();
        tx.commit().await.unwrap();

        let err = h
            .service
            .update_member_role(team.id(), carol.id(), TeamRole::Admin, owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::NotFound);
    }

    /// Membership reads that return `rows` instead of the store's current state
    fn stale_members(rows: Vec<TeamMember>) -> MockMembershipRepository {
        let mut members = MockMembershipRepository::new();
        members.expect_find().returning(move |team_id, user_id| {
            Ok(rows
                .iter()
                .find(|m| m.team_id() == *team_id && m.user_id() == *user_id)
                .cloned())
        });
        members
    }

    #[tokio::test]
    async fn test_removal_decides_on_locked_roles() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let admin = h.join(&team, &owner, "admin@x.com", TeamRole::Admin).await;
        let bob = h.join(&team, &owner, "bob@x.com", TeamRole::Member).await;

        let admin_row = h.store.find(&team.id(), &admin.id()).await.unwrap().unwrap();
        let stale_bob = h.store.find(&team.id(), &bob.id()).await.unwrap().unwrap();

        // Bob is promoted after the remover last looked
        h.service
            .update_member_role(team.id(), bob.id(), TeamRole::Admin, owner.id())
            .await
            .unwrap();

        let deps = TeamMembershipDeps {
            members: Arc::new(stale_members(vec![admin_row, stale_bob])),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());

        let err = service
            .remove_member(team.id(), bob.id(), admin.id())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            MembershipError::forbidden("Admins cannot remove other admins")
        );
        let kept = h.store.find(&team.id(), &bob.id()).await.unwrap().unwrap();
        assert_eq!(kept.role(), TeamRole::Admin);
        assert_eq!(h.subscription(&team).await.seats(), 3);
    }

    #[tokio::test]
    async fn test_role_change_after_concurrent_removal_is_not_found() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let bob = h.join(&team, &owner, "bob@x.com", TeamRole::Member).await;

        let owner_row = h.store.find(&team.id(), &owner.id()).await.unwrap().unwrap();
        let stale_bob = h.store.find(&team.id(), &bob.id()).await.unwrap().unwrap();
        h.service
            .remove_member(team.id(), bob.id(), owner.id())
            .await
            .unwrap();

        let deps = TeamMembershipDeps {
            members: Arc::new(stale_members(vec![owner_row, stale_bob])),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());

        let err = service
            .update_member_role(team.id(), bob.id(), TeamRole::Admin, owner.id())
            .await
            .unwrap_err();

        assert_eq!(err, MembershipError::not_found("Member not found"));
        assert!(h.store.find(&team.id(), &bob.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_demoted_actor_cannot_remove() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let admin = h.join(&team, &owner, "admin@x.com", TeamRole::Admin).await;
        let bob = h.join(&team, &owner, "bob@x.com", TeamRole::Member).await;

        let stale_admin = h.store.find(&team.id(), &admin.id()).await.unwrap().unwrap();
        let bob_row = h.store.find(&team.id(), &bob.id()).await.unwrap().unwrap();
        h.service
            .update_member_role(team.id(), admin.id(), TeamRole::Viewer, owner.id())
            .await
            .unwrap();

        let deps = TeamMembershipDeps {
            members: Arc::new(stale_members(vec![stale_admin, bob_row])),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());

        let err = service
            .remove_member(team.id(), bob.id(), admin.id())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            MembershipError::forbidden("Only owners and admins can remove members")
        );
        assert!(h.store.find(&team.id(), &bob.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_team_requires_membership() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        h.join(&team, &owner, "bob@x.com", TeamRole::Member).await;
        let stranger = h.user("stranger@x.com").await;

        let details = h.service.get_team(team.id(), owner.id()).await.unwrap();
        assert_eq!(details.members.len(), 2);
        assert_eq!(details.subscription.seats(), 2);

        let err = h
            .service
            .get_team(team.id(), stranger.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);

        let err = h
            .service
            .get_team(TeamId::generate(), owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_listing_teams_and_invitations() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let acme = h.team("Acme", &owner).await;
        let globex = h.team("Globex", &owner).await;
        let bob = h.join(&acme, &owner, "bob@x.com", TeamRole::Member).await;
        h.service
            .invite_member("bob@x.com", TeamRole::Viewer, globex.id(), owner.id())
            .await
            .unwrap();

        let teams = h.service.list_teams_for_user(bob.id()).await.unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].id(), acme.id());

        let pending = h.service.list_pending_invitations(bob.id()).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].team.id(), globex.id());
        assert_eq!(pending[0].invitation.role(), TeamRole::Viewer);

        assert_eq!(h.service.list_teams_for_user(owner.id()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rename_keeps_slug() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let member = h.join(&team, &owner, "m@x.com", TeamRole::Member).await;

        let renamed = h
            .service
            .rename_team(team.id(), "Acme Corporation", owner.id())
            .await
            .unwrap();
        assert_eq!(renamed.name(), "Acme Corporation");
        assert_eq!(renamed.slug(), "acme");

        let err = h
            .service
            .rename_team(team.id(), "Hijacked", member.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);

        let err = h
            .service
            .rename_team(team.id(), "", owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_change_plan_guards_quota() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h
            .service
            .create_team("Acme", owner.id(), Some("pro"))
            .await
            .unwrap()
            .team;
        for i in 0..5 {
            h.join(&team, &owner, &format!("m{}@x.com", i), TeamRole::Member)
                .await;
        }

        let err = h
            .service
            .change_plan(team.id(), "free", owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Conflict);

        let subscription = h
            .service
            .change_plan(team.id(), "business", owner.id())
            .await
            .unwrap();
        assert_eq!(subscription.max_seats(), 100);
        assert_eq!(subscription.plan(), "business");

        let reloaded = TeamRepository::get(&h.store, &team.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.plan(), "business");

        let err = h
            .service
            .change_plan(team.id(), "gold", owner.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_change_plan_owner_only() {
        let h = harness();
        let owner = h.user("owner@x.com").await;
        let team = h.team("Acme", &owner).await;
        let admin = h.join(&team, &owner, "admin@x.com", TeamRole::Admin).await;

        let err = h
            .service
            .change_plan(team.id(), "pro", admin.id())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), MembershipErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_register_user_is_idempotent() {
        let h = harness();

        let first = h
            .service
            .register_user("Alice@X.com", Some("Alice"))
            .await
            .unwrap();
        let second = h.service.register_user("alice@x.com", None).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(second.email(), "alice@x.com");

        let err = h.service.register_user("nope", None).await.unwrap_err();
        assert_eq!(err.kind(), MembershipErrorKind::Invalid);
    }

    fn deps_over(store: &InMemoryStore) -> TeamMembershipDeps {
        let store = Arc::new(store.clone());
        TeamMembershipDeps {
            users: store.clone(),
            teams: store.clone(),
            members: store.clone(),
            subscriptions: store.clone(),
            unit_of_work: store,
            billing: Arc::new(permissive_billing()),
            notifier: Arc::new(permissive_notifier()),
        }
    }

    fn assert_hidden(err: MembershipError) {
        assert_eq!(err.kind(), MembershipErrorKind::Service);
        assert_eq!(err.to_string(), crate::infrastructure::team::SERVICE_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_storage_failures_are_hidden() {
        let h = harness();
        let alice = h.user("alice@x.com").await;
        let team = h.team("Acme", &alice).await;

        let mut users = MockUserRepository::new();
        users
            .expect_get()
            .returning(|_| Err(DomainError::storage("connection reset")));
        let deps = TeamMembershipDeps {
            users: Arc::new(users),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());
        assert_hidden(service.create_team("Other", alice.id(), None).await.unwrap_err());

        let mut teams = MockTeamRepository::new();
        teams
            .expect_get()
            .returning(|_| Err(DomainError::storage("connection reset")));
        let deps = TeamMembershipDeps {
            teams: Arc::new(teams),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());
        assert_hidden(service.get_team(team.id(), alice.id()).await.unwrap_err());

        let mut members = MockMembershipRepository::new();
        members
            .expect_list_for_user()
            .returning(|_| Err(DomainError::storage("connection reset")));
        let deps = TeamMembershipDeps {
            members: Arc::new(members),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());
        assert_hidden(service.list_teams_for_user(alice.id()).await.unwrap_err());

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_get()
            .returning(|_| Err(DomainError::storage("connection reset")));
        let deps = TeamMembershipDeps {
            subscriptions: Arc::new(subscriptions),
            ..deps_over(&h.store)
        };
        let service = TeamMembershipService::new(deps, MembershipSettings::default());
        assert_hidden(service.get_team(team.id(), alice.id()).await.unwrap_err());
    }
}
