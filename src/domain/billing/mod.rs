//! Billing domain - boundary to the payment provider

mod provider;

pub use provider::{BillingCustomer, BillingProvider, NewBillingCustomer};

#[cfg(test)]
pub use provider::MockBillingProvider;
