//! Billing provider that never leaves the process

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::domain::billing::{BillingCustomer, BillingProvider, NewBillingCustomer};
use crate::domain::DomainError;

/// Issues `cus_local_*` ids and only logs quantity changes
#[derive(Debug, Clone, Default)]
pub struct LocalBillingProvider;

impl LocalBillingProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BillingProvider for LocalBillingProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn create_customer(
        &self,
        customer: NewBillingCustomer,
    ) -> Result<BillingCustomer, DomainError> {
        let id = format!("cus_local_{}", Uuid::new_v4().simple());
        info!(customer_id = %id, email = %customer.email, "Registered local billing customer");

        Ok(BillingCustomer { id })
    }

    async fn update_subscription_quantity(
        &self,
        subscription_id: &str,
        quantity: u32,
    ) -> Result<(), DomainError> {
        info!(subscription_id, quantity, "Local billing quantity update");
        Ok(())
    }
}
