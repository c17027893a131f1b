//! Database connection and repositories

pub mod entities;
pub mod members;
pub mod schema_sync;
pub mod seed;
pub mod teams;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::config::Config;
use crate::orm::QueryFactory;

pub use entities::{MEMBER, Member, QMember, QTeam, Relation, TEAM, Team};
pub use members::{CreateMember, MemberRepository, MemberSearchCondition, MemberTeamDto};
pub use schema_sync::{SchemaSyncResult, sync_all_entity_schemas};
pub use seed::{SeedResult, seed_sample_data};
pub use teams::TeamRepository;

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether `url` names a private in-memory database.
    ///
    /// Every connection to such a URL opens a fresh, empty database, so the
    /// pool must hold exactly one connection and never recycle it.
    pub fn is_in_memory(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }

    /// Create a new database connection pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if Self::is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        info!(url = %url, "Database connected");
        Ok(Self { pool })
    }

    /// Connect using the loaded configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::connect(&config.database_url, config.max_connections).await
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a query factory bound to this pool
    pub fn query_factory(&self) -> QueryFactory {
        QueryFactory::new(self.pool.clone())
    }

    /// Get a member repository
    pub fn members(&self) -> MemberRepository {
        MemberRepository::new(self.pool.clone())
    }

    /// Get a team repository
    pub fn teams(&self) -> TeamRepository {
        TeamRepository::new(self.pool.clone())
    }

    /// Create or extend tables to match the entity definitions
    pub async fn sync_schema(&self) -> SchemaSyncResult {
        sync_all_entity_schemas(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
