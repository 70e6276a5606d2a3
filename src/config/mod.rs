//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, BillingConfig, BillingProviderKind, LogFormat, LoggingConfig, MembershipConfig,
    MetricsConfig, NotificationConfig, NotifierKind, ServerConfig, StorageBackend, StorageConfig,
};
