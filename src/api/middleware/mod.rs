//! API middleware components

pub mod caller;
pub mod metrics;

pub use caller::{RequireCaller, CALLER_HEADER};
pub use metrics::metrics_middleware;
