//! PostgreSQL store with connection pooling

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::domain::ids::{MembershipId, TeamId, UserId};
use crate::domain::membership::{MemberStatus, MembershipRepository, TeamMember};
use crate::domain::subscription::{SubscriptionRepository, TeamSubscription};
use crate::domain::team::{Team, TeamRepository, TeamRole};
use crate::domain::unit_of_work::{TeamTransaction, UnitOfWork};
use crate::domain::user::{User, UserRepository};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/qrcraft_teams".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Opens a pooled connection using the given configuration
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

const USER_COLUMNS: &str = "id, email, name, created_at, updated_at";
const TEAM_COLUMNS: &str =
    "id, name, slug, owner_id, plan, billing_customer_id, created_at, updated_at";
const MEMBER_COLUMNS: &str = "id, team_id, user_id, role, status, invited_by, expires_at, \
     joined_at, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str =
    "team_id, seats, max_seats, plan, billing_subscription_id, created_at, updated_at";

/// Store backed by PostgreSQL, implementing every repository and the unit of work
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        Ok(Self::new(connect_pool(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trips a trivial query, used by the readiness probe
    pub async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Database unreachable: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get user by email: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn upsert_by_email(&self, candidate: User) -> Result<User, DomainError> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, email, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(candidate.id().as_uuid())
        .bind(candidate.email())
        .bind(candidate.name())
        .bind(candidate.created_at())
        .bind(candidate.updated_at())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to upsert user: {}", e)))?;

        row_to_user(&row)
    }
}

#[async_trait]
impl TeamRepository for PostgresStore {
    async fn get(&self, id: &TeamId) -> Result<Option<Team>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM teams WHERE id = $1", TEAM_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get team: {}", e)))?;

        row.as_ref().map(row_to_team).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Team>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM teams WHERE slug = $1",
            TEAM_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get team by slug: {}", e)))?;

        row.as_ref().map(row_to_team).transpose()
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM teams WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check slug: {}", e)))
    }

    async fn update(&self, team: Team) -> Result<Team, DomainError> {
        let result = bind_team_update(sqlx::query(UPDATE_TEAM_SQL), &team)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update team: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Team '{}' not found",
                team.id()
            )));
        }

        Ok(team)
    }
}

#[async_trait]
impl MembershipRepository for PostgresStore {
    async fn get(&self, id: &MembershipId) -> Result<Option<TeamMember>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM team_members WHERE id = $1",
            MEMBER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get membership: {}", e)))?;

        row.as_ref().map(row_to_member).transpose()
    }

    async fn find(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM team_members WHERE team_id = $1 AND user_id = $2",
            MEMBER_COLUMNS
        ))
        .bind(team_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to find membership: {}", e)))?;

        row.as_ref().map(row_to_member).transpose()
    }

    async fn list_for_team(&self, team_id: &TeamId) -> Result<Vec<TeamMember>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM team_members WHERE team_id = $1 ORDER BY created_at, id",
            MEMBER_COLUMNS
        ))
        .bind(team_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list team members: {}", e)))?;

        rows.iter().map(row_to_member).collect()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<TeamMember>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM team_members WHERE user_id = $1 ORDER BY created_at, id",
            MEMBER_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list memberships: {}", e)))?;

        rows.iter().map(row_to_member).collect()
    }

    async fn count_active(&self, team_id: &TeamId) -> Result<u32, DomainError> {
        let count: i64 = sqlx::query_scalar(COUNT_ACTIVE_SQL)
            .bind(team_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count members: {}", e)))?;

        to_u32(count, "active member count")
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresStore {
    async fn get(&self, team_id: &TeamId) -> Result<Option<TeamSubscription>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM team_subscriptions WHERE team_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(team_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get subscription: {}", e)))?;

        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn update(
        &self,
        subscription: TeamSubscription,
    ) -> Result<TeamSubscription, DomainError> {
        let result = bind_subscription_update(sqlx::query(UPDATE_SUBSCRIPTION_SQL), &subscription)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update subscription: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Subscription for team '{}' not found",
                subscription.team_id()
            )));
        }

        Ok(subscription)
    }
}

#[async_trait]
impl UnitOfWork for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn TeamTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// Transaction over [`PostgresStore`]; sqlx rolls it back when dropped
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TeamTransaction for PostgresTransaction {
    async fn insert_team(&mut self, team: &Team) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, slug, owner_id, plan, billing_customer_id,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(team.id().as_uuid())
        .bind(team.name())
        .bind(team.slug())
        .bind(team.owner_id().as_uuid())
        .bind(team.plan())
        .bind(team.billing_customer_id())
        .bind(team.created_at())
        .bind(team.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            write_error(e, "create team", || {
                format!("Team slug '{}' already taken", team.slug())
            })
        })?;

        Ok(())
    }

    async fn update_team(&mut self, team: &Team) -> Result<(), DomainError> {
        let result = bind_team_update(sqlx::query(UPDATE_TEAM_SQL), team)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update team: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Team '{}' not found",
                team.id()
            )));
        }

        Ok(())
    }

    async fn get_member(&mut self, id: &MembershipId) -> Result<Option<TeamMember>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM team_members WHERE id = $1 FOR UPDATE",
            MEMBER_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get membership: {}", e)))?;

        row.as_ref().map(row_to_member).transpose()
    }

    async fn insert_member(&mut self, member: &TeamMember) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO team_members (id, team_id, user_id, role, status, invited_by,
                                      expires_at, joined_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(member.id().as_uuid())
        .bind(member.team_id().as_uuid())
        .bind(member.user_id().as_uuid())
        .bind(member.role().as_str())
        .bind(member.status().as_str())
        .bind(member.invited_by().map(|id| id.as_uuid()))
        .bind(member.expires_at())
        .bind(member.joined_at())
        .bind(member.created_at())
        .bind(member.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            write_error(e, "create membership", || {
                format!(
                    "User '{}' already has a membership in team '{}'",
                    member.user_id(),
                    member.team_id()
                )
            })
        })?;

        Ok(())
    }

    async fn update_member(&mut self, member: &TeamMember) -> Result<(), DomainError> {
        let result = bind_member_update(sqlx::query(UPDATE_MEMBER_SQL), member)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update membership: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Membership '{}' not found",
                member.id()
            )));
        }

        Ok(())
    }

    async fn delete_member(&mut self, id: &MembershipId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM team_members WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete membership: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_subscription(
        &mut self,
        subscription: &TeamSubscription,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO team_subscriptions (team_id, seats, max_seats, plan,
                                            billing_subscription_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(subscription.team_id().as_uuid())
        .bind(subscription.seats() as i32)
        .bind(subscription.max_seats() as i32)
        .bind(subscription.plan())
        .bind(subscription.billing_subscription_id())
        .bind(subscription.created_at())
        .bind(subscription.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            write_error(e, "create subscription", || {
                format!(
                    "Subscription for team '{}' already exists",
                    subscription.team_id()
                )
            })
        })?;

        Ok(())
    }

    async fn update_subscription(
        &mut self,
        subscription: &TeamSubscription,
    ) -> Result<(), DomainError> {
        let result = bind_subscription_update(sqlx::query(UPDATE_SUBSCRIPTION_SQL), subscription)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update subscription: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Subscription for team '{}' not found",
                subscription.team_id()
            )));
        }

        Ok(())
    }

    async fn lock_subscription(
        &mut self,
        team_id: &TeamId,
    ) -> Result<Option<TeamSubscription>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM team_subscriptions WHERE team_id = $1 FOR UPDATE",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(team_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to lock subscription: {}", e)))?;

        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn count_active_members(&mut self, team_id: &TeamId) -> Result<u32, DomainError> {
        let count: i64 = sqlx::query_scalar(COUNT_ACTIVE_SQL)
            .bind(team_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count members: {}", e)))?;

        to_u32(count, "active member count")
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))
    }
}

const COUNT_ACTIVE_SQL: &str =
    "SELECT COUNT(*) FROM team_members WHERE team_id = $1 AND status = 'active'";

const UPDATE_TEAM_SQL: &str = r#"
    UPDATE teams
    SET name = $2, plan = $3, billing_customer_id = $4, updated_at = $5
    WHERE id = $1
"#;

const UPDATE_MEMBER_SQL: &str = r#"
    UPDATE team_members
    SET role = $2, status = $3, invited_by = $4, expires_at = $5, joined_at = $6,
        updated_at = $7
    WHERE id = $1
"#;

const UPDATE_SUBSCRIPTION_SQL: &str = r#"
    UPDATE team_subscriptions
    SET seats = $2, max_seats = $3, plan = $4, billing_subscription_id = $5, updated_at = $6
    WHERE team_id = $1
"#;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn bind_team_update<'q>(query: PgQuery<'q>, team: &'q Team) -> PgQuery<'q> {
    query
        .bind(team.id().as_uuid())
        .bind(team.name())
        .bind(team.plan())
        .bind(team.billing_customer_id())
        .bind(team.updated_at())
}

fn bind_member_update<'q>(query: PgQuery<'q>, member: &'q TeamMember) -> PgQuery<'q> {
    query
        .bind(member.id().as_uuid())
        .bind(member.role().as_str())
        .bind(member.status().as_str())
        .bind(member.invited_by().map(|id| id.as_uuid()))
        .bind(member.expires_at())
        .bind(member.joined_at())
        .bind(member.updated_at())
}

fn bind_subscription_update<'q>(
    query: PgQuery<'q>,
    subscription: &'q TeamSubscription,
) -> PgQuery<'q> {
    query
        .bind(subscription.team_id().as_uuid())
        .bind(subscription.seats() as i32)
        .bind(subscription.max_seats() as i32)
        .bind(subscription.plan())
        .bind(subscription.billing_subscription_id())
        .bind(subscription.updated_at())
}

/// Unique violations become conflicts, everything else is a storage failure
fn write_error(e: sqlx::Error, action: &str, conflict: impl FnOnce() -> String) -> DomainError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());

    if unique {
        DomainError::conflict(conflict())
    } else {
        DomainError::storage(format!("Failed to {}: {}", action, e))
    }
}

fn to_u32(value: impl TryInto<u32>, what: &str) -> Result<u32, DomainError> {
    value
        .try_into()
        .map_err(|_| DomainError::storage(format!("Out of range {}", what)))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::storage(format!("Failed to read column {}: {}", name, e)))
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    Ok(User::restore(
        UserId::from_uuid(column(row, "id")?),
        column(row, "email")?,
        column(row, "name")?,
        column(row, "created_at")?,
        column(row, "updated_at")?,
    ))
}

fn row_to_team(row: &PgRow) -> Result<Team, DomainError> {
    Ok(Team::restore(
        TeamId::from_uuid(column(row, "id")?),
        column(row, "name")?,
        column(row, "slug")?,
        UserId::from_uuid(column(row, "owner_id")?),
        column(row, "plan")?,
        column(row, "billing_customer_id")?,
        column(row, "created_at")?,
        column(row, "updated_at")?,
    ))
}

fn row_to_member(row: &PgRow) -> Result<TeamMember, DomainError> {
    let role: String = column(row, "role")?;
    let role: TeamRole = role
        .parse()
        .map_err(|e| DomainError::storage(format!("Invalid stored role: {}", e)))?;
    let status: String = column(row, "status")?;
    let status: MemberStatus = status
        .parse()
        .map_err(|e| DomainError::storage(format!("Invalid stored status: {}", e)))?;
    let invited_by: Option<uuid::Uuid> = column(row, "invited_by")?;

    Ok(TeamMember::restore(
        MembershipId::from_uuid(column(row, "id")?),
        TeamId::from_uuid(column(row, "team_id")?),
        UserId::from_uuid(column(row, "user_id")?),
        role,
        status,
        invited_by.map(UserId::from_uuid),
        column(row, "expires_at")?,
        column(row, "joined_at")?,
        column(row, "created_at")?,
        column(row, "updated_at")?,
    ))
}

fn row_to_subscription(row: &PgRow) -> Result<TeamSubscription, DomainError> {
    let seats: i32 = column(row, "seats")?;
    let max_seats: i32 = column(row, "max_seats")?;

    Ok(TeamSubscription::restore(
        TeamId::from_uuid(column(row, "team_id")?),
        to_u32(seats, "seat count")?,
        to_u32(max_seats, "seat limit")?,
        column(row, "plan")?,
        column(row, "billing_subscription_id")?,
        column(row, "created_at")?,
        column(row, "updated_at")?,
    ))
}
