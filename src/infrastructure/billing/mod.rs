//! Billing provider implementations

mod local;
mod stripe;

use std::sync::Arc;
use std::time::Duration;

pub use local::LocalBillingProvider;
pub use stripe::StripeBillingProvider;

use crate::config::{BillingConfig, BillingProviderKind};
use crate::domain::billing::BillingProvider;
use crate::domain::DomainError;

/// Builds the configured billing provider
pub fn create_billing_provider(
    config: &BillingConfig,
) -> Result<Arc<dyn BillingProvider>, DomainError> {
    match config.provider {
        BillingProviderKind::Local => Ok(Arc::new(LocalBillingProvider::new())),
        BillingProviderKind::Stripe => {
            let api_key = config.api_key.as_deref().ok_or_else(|| {
                DomainError::configuration("billing.api_key is required for the stripe provider")
            })?;

            Ok(Arc::new(StripeBillingProvider::new(
                &config.api_base,
                api_key,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}
