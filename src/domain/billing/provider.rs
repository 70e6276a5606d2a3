//! Billing provider trait

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::domain::DomainError;

/// Customer record to register at the billing provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBillingCustomer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl NewBillingCustomer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Customer record created by the billing provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingCustomer {
    pub id: String,
}

/// External billing system holding customers and seat-based subscriptions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Provider name used in logs and errors
    fn name(&self) -> &str;

    async fn create_customer(
        &self,
        customer: NewBillingCustomer,
    ) -> Result<BillingCustomer, DomainError>;

    async fn update_subscription_quantity(
        &self,
        subscription_id: &str,
        quantity: u32,
    ) -> Result<(), DomainError>;
}
