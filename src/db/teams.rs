//! Team database operations

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use super::entities::{MEMBER, Member, Relation, TEAM, Team};
use crate::orm::{QueryFactory, RepositorySupport};

/// Team repository for database operations
pub struct TeamRepository {
    support: RepositorySupport<super::entities::QTeam>,
}

impl TeamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            support: RepositorySupport::new(pool, TEAM),
        }
    }

    fn factory(&self) -> &QueryFactory {
        self.support.factory()
    }

    /// Insert a team and return it with its assigned id
    pub async fn create(&self, name: &str) -> Result<Team> {
        let result = sqlx::query("INSERT INTO team (name) VALUES (?1)")
            .bind(name)
            .execute(self.factory().pool())
            .await
            .with_context(|| format!("Failed to insert team {}", name))?;

        let id = result.last_insert_rowid();
        debug!(id, name, "Team created");

        Ok(Team {
            id,
            name: name.to_string(),
            members: Relation::Loaded(Vec::new()),
        })
    }

    /// Get a team by ID
    pub async fn get(&self, id: i64) -> Result<Option<Team>> {
        let team = self
            .support
            .select_from(TEAM)
            .filter(TEAM.id.eq(id))
            .fetch_one()
            .await?;
        Ok(team)
    }

    /// All teams ordered by name
    pub async fn find_all(&self) -> Result<Vec<Team>> {
        let teams = self
            .support
            .select_from(TEAM)
            .order_by(TEAM.name.asc())
            .fetch()
            .await?;
        Ok(teams)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Team>> {
        let team = self
            .support
            .select_from(TEAM)
            .filter(TEAM.name.eq(name))
            .fetch_first()
            .await?;
        Ok(team)
    }

    /// Fill the inverse member collection with one query
    pub async fn load_members(&self, team: &mut Team) -> Result<()> {
        let members: Vec<Member> = self
            .factory()
            .select_from(MEMBER)
            .filter(MEMBER.team_id.eq(team.id))
            .order_by(MEMBER.id.asc())
            .fetch()
            .await?;
        team.members = Relation::Loaded(members);
        Ok(())
    }
}
