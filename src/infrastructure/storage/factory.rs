//! Runtime selection of the backing store

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::membership::MembershipRepository;
use crate::domain::subscription::SubscriptionRepository;
use crate::domain::team::TeamRepository;
use crate::domain::unit_of_work::UnitOfWork;
use crate::domain::user::UserRepository;
use crate::domain::DomainError;

use super::in_memory::InMemoryStore;
use super::migrations::run_membership_migrations;
use super::postgres::{PostgresConfig, PostgresStore};

/// Trait-object views over a single store
#[derive(Clone)]
pub struct StoreHandles {
    pub users: Arc<dyn UserRepository>,
    pub teams: Arc<dyn TeamRepository>,
    pub members: Arc<dyn MembershipRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub unit_of_work: Arc<dyn UnitOfWork>,
}

impl StoreHandles {
    fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + TeamRepository
            + MembershipRepository
            + SubscriptionRepository
            + UnitOfWork
            + 'static,
    {
        Self {
            users: store.clone(),
            teams: store.clone(),
            members: store.clone(),
            subscriptions: store.clone(),
            unit_of_work: store,
        }
    }
}

/// The configured store
#[derive(Debug, Clone)]
pub enum MembershipStore {
    InMemory(Arc<InMemoryStore>),
    Postgres(Arc<PostgresStore>),
}

impl MembershipStore {
    /// Connects to the configured backend
    ///
    /// PostgreSQL migrations run first when `storage.run_migrations` is set.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, DomainError> {
        match config.backend {
            StorageBackend::Memory => Ok(Self::InMemory(Arc::new(InMemoryStore::new()))),
            StorageBackend::Postgres => {
                let store = PostgresStore::connect(&postgres_config(config)).await?;

                if config.run_migrations {
                    run_membership_migrations(store.pool()).await?;
                }

                Ok(Self::Postgres(Arc::new(store)))
            }
        }
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::InMemory(_) => StorageBackend::Memory,
            Self::Postgres(_) => StorageBackend::Postgres,
        }
    }

    pub fn handles(&self) -> StoreHandles {
        match self {
            Self::InMemory(store) => StoreHandles::from_store(store.clone()),
            Self::Postgres(store) => StoreHandles::from_store(store.clone()),
        }
    }

    /// Verifies the backend is reachable
    pub async fn ping(&self) -> Result<(), DomainError> {
        match self {
            Self::InMemory(_) => Ok(()),
            Self::Postgres(store) => store.ping().await,
        }
    }
}

/// Pool settings from the storage section
pub fn postgres_config(config: &StorageConfig) -> PostgresConfig {
    PostgresConfig::new(&config.url)
        .with_max_connections(config.max_connections)
        .with_min_connections(config.min_connections)
        .with_connect_timeout(config.connect_timeout_secs)
        .with_idle_timeout(config.idle_timeout_secs)
}
