use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::subscription::{PlanCatalog, DEFAULT_PLAN};

/// Application configuration
///
/// Every section falls back to its defaults, so an empty environment yields a
/// runnable in-memory service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub billing: BillingConfig,
    pub notifications: NotificationConfig,
    pub membership: MembershipConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Apply pending migrations when `serve` starts
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BillingProviderKind {
    #[default]
    Local,
    Stripe,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub provider: BillingProviderKind,
    pub api_base: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Log,
    Resend,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub provider: NotifierKind,
    pub api_base: String,
    pub api_key: Option<String>,
    /// Sender address for invitation emails
    pub from: String,
    pub timeout_secs: u64,
    /// Public URL invitation links point at
    pub app_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Route the Prometheus exporter is mounted on
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    pub invitation_ttl_days: i64,
    pub default_plan: String,
    /// Plan id to seat quota
    pub plans: BTreeMap<String, u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: "postgres://localhost/qrcraft_teams".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            run_migrations: false,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            provider: BillingProviderKind::default(),
            api_base: "https://api.stripe.com".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            provider: NotifierKind::default(),
            api_base: "https://api.resend.com".to_string(),
            api_key: None,
            from: "QRCraft <noreply@qrcraft.app>".to_string(),
            timeout_secs: 10,
            app_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        let catalog = PlanCatalog::default();

        Self {
            invitation_ttl_days: 7,
            default_plan: DEFAULT_PLAN.to_string(),
            plans: catalog
                .plans()
                .map(|(id, seats)| (id.to_string(), seats))
                .collect(),
        }
    }
}

impl MembershipConfig {
    /// Validated plan catalog
    pub fn plan_catalog(&self) -> Result<PlanCatalog, String> {
        PlanCatalog::new(self.default_plan.clone(), self.plans.clone())
    }
}

impl AppConfig {
    /// Layers `config/default`, `config/local` and `APP__*` environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
