//! Storage infrastructure - in-memory and PostgreSQL stores

mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use factory::{postgres_config, MembershipStore, StoreHandles};
pub use in_memory::InMemoryStore;
pub use migrations::{
    membership_migrations, revert_last_migration, run_membership_migrations, Migration,
    PostgresMigrator,
};
pub use postgres::{connect_pool, PostgresConfig, PostgresStore};
