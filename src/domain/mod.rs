//! Domain layer - Core business logic and entities

pub mod billing;
pub mod error;
pub mod ids;
pub mod membership;
pub mod notification;
pub mod subscription;
pub mod team;
pub mod unit_of_work;
pub mod user;

pub use billing::{BillingCustomer, BillingProvider, NewBillingCustomer};
pub use error::DomainError;
pub use ids::{MembershipId, TeamId, UserId};
pub use membership::{MemberStatus, MembershipRepository, TeamMember};
pub use notification::{InvitationNotifier, TeamInvitationNotice};
pub use subscription::{PlanCatalog, SubscriptionRepository, TeamSubscription};
pub use team::{Team, TeamRepository, TeamRole};
pub use unit_of_work::{TeamTransaction, UnitOfWork};
pub use user::{User, UserRepository};
