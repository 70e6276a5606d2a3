//! Team subscription entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::TeamId;

/// Seat quota and billing linkage for one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSubscription {
    team_id: TeamId,
    /// Seats held by ACTIVE members
    seats: u32,
    /// Admission limit for invitations and acceptances
    max_seats: u32,
    plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    billing_subscription_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TeamSubscription {
    /// A fresh subscription whose single seat belongs to the owner
    pub fn new(team_id: TeamId, plan: impl Into<String>, max_seats: u32) -> Self {
        let now = Utc::now();

        Self {
            team_id,
            seats: 1,
            max_seats,
            plan: plan.into(),
            billing_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a subscription from persisted fields
    pub fn restore(
        team_id: TeamId,
        seats: u32,
        max_seats: u32,
        plan: String,
        billing_subscription_id: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            team_id,
            seats,
            max_seats,
            plan,
            billing_subscription_id,
            created_at,
            updated_at,
        }
    }

    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    pub fn seats(&self) -> u32 {
        self.seats
    }

    pub fn max_seats(&self) -> u32 {
        self.max_seats
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    pub fn billing_subscription_id(&self) -> Option<&str> {
        self.billing_subscription_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether another member can be admitted given `active` occupied seats
    pub fn admits(&self, active: u32) -> bool {
        active < self.max_seats
    }

    /// Record the number of occupied seats
    pub fn set_seats(&mut self, seats: u32) {
        self.seats = seats;
        self.touch();
    }

    /// Move to another plan with its quota
    pub fn change_plan(&mut self, plan: impl Into<String>, max_seats: u32) {
        self.plan = plan.into();
        self.max_seats = max_seats;
        self.touch();
    }

    /// Link to the subscription record at the billing provider
    pub fn set_billing_subscription_id(&mut self, id: impl Into<String>) {
        self.billing_subscription_id = Some(id.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
