//! QRCraft Teams
//!
//! Team membership service: team creation, invitations with expiry, a
//! four-level role hierarchy and plan-based seat quotas, backed by an
//! in-memory or PostgreSQL store and external billing and email providers.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::info;

use api::state::AppState;
use infrastructure::billing::create_billing_provider;
use infrastructure::notification::create_invitation_notifier;
use infrastructure::storage::MembershipStore;
use infrastructure::team::{MembershipSettings, TeamMembershipDeps, TeamMembershipService};

/// Builds the store, collaborators and service described by `config`
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let settings = membership_settings(config)?;

    let store = MembershipStore::from_config(&config.storage)
        .await
        .context("initializing storage")?;
    let billing =
        create_billing_provider(&config.billing).context("initializing billing provider")?;
    let notifier = create_invitation_notifier(&config.notifications)
        .context("initializing invitation notifier")?;

    info!(
        storage = store.backend().as_str(),
        billing = billing.name(),
        default_plan = settings.plans.default_plan(),
        "Membership service ready"
    );

    let handles = store.handles();
    let deps = TeamMembershipDeps {
        users: handles.users,
        teams: handles.teams,
        members: handles.members,
        subscriptions: handles.subscriptions,
        unit_of_work: handles.unit_of_work,
        billing,
        notifier,
    };

    Ok(AppState::new(
        Arc::new(TeamMembershipService::new(deps, settings)),
        store,
    ))
}

/// Plan catalog and invitation lifetime from the `membership` section
pub fn membership_settings(config: &AppConfig) -> anyhow::Result<MembershipSettings> {
    let plans = config
        .membership
        .plan_catalog()
        .map_err(|e| anyhow!(e))
        .context("invalid membership.plans")?;

    if config.membership.invitation_ttl_days <= 0 {
        anyhow::bail!("membership.invitation_ttl_days must be positive");
    }

    Ok(MembershipSettings {
        plans,
        invitation_ttl: chrono::Duration::days(config.membership.invitation_ttl_days),
    })
}
