//! Application state shared by the handlers

use std::sync::Arc;

use crate::infrastructure::storage::MembershipStore;
use crate::infrastructure::team::TeamMembershipService;

#[derive(Clone)]
pub struct AppState {
    pub membership: Arc<TeamMembershipService>,
    /// Kept for readiness probes
    pub store: MembershipStore,
}

impl AppState {
    pub fn new(membership: Arc<TeamMembershipService>, store: MembershipStore) -> Self {
        Self { membership, store }
    }
}
