//! Plan catalog mapping plan identifiers to seat quotas

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Plan every team starts on unless told otherwise
pub const DEFAULT_PLAN: &str = "free";

/// Seat quotas per plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanCatalog {
    default_plan: String,
    plans: BTreeMap<String, u32>,
}

impl PlanCatalog {
    /// Build a catalog; `default_plan` must be one of `plans`
    pub fn new(
        default_plan: impl Into<String>,
        plans: BTreeMap<String, u32>,
    ) -> Result<Self, String> {
        let default_plan = default_plan.into();

        if !plans.contains_key(&default_plan) {
            return Err(format!(
                "Default plan '{}' is not defined in the plan catalog",
                default_plan
            ));
        }

        if let Some((id, _)) = plans.iter().find(|(_, seats)| **seats == 0) {
            return Err(format!("Plan '{}' must allow at least one seat", id));
        }

        Ok(Self {
            default_plan,
            plans,
        })
    }

    pub fn default_plan(&self) -> &str {
        &self.default_plan
    }

    /// Seat quota for a plan, `None` if the plan is unknown
    pub fn max_seats(&self, plan: &str) -> Option<u32> {
        self.plans.get(plan).copied()
    }

    pub fn contains(&self, plan: &str) -> bool {
        self.plans.contains_key(plan)
    }

    pub fn plans(&self) -> impl Iterator<Item = (&str, u32)> {
        self.plans.iter().map(|(id, seats)| (id.as_str(), *seats))
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let plans = BTreeMap::from([
            (DEFAULT_PLAN.to_string(), 5),
            ("pro".to_string(), 25),
            ("business".to_string(), 100),
        ]);

        Self {
            default_plan: DEFAULT_PLAN.to_string(),
            plans,
        }
    }
}
