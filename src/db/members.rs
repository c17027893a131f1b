//! Member database operations and search

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use super::entities::{MEMBER, Member, QMember, Relation, TEAM, Team};
use crate::orm::{Page, PageRequest, Predicate, RepositorySupport, SelectQuery};

/// Input for creating a new member
#[derive(Debug, Clone, Default)]
pub struct CreateMember {
    pub username: Option<String>,
    pub age: i32,
    pub team_id: Option<i64>,
}

impl CreateMember {
    pub fn new(username: Option<&str>, age: i32) -> Self {
        Self {
            username: username.map(str::to_string),
            age,
            team_id: None,
        }
    }

    pub fn with_team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }
}

/// Optional search criteria; absent or blank values do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSearchCondition {
    pub username: Option<String>,
    pub team_name: Option<String>,
    pub age_goe: Option<i32>,
    pub age_loe: Option<i32>,
}

/// Flat member + team row for search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberTeamDto {
    pub member_id: i64,
    pub username: Option<String>,
    pub age: i32,
    pub team_id: Option<i64>,
    pub team_name: Option<String>,
}

impl From<(i64, Option<String>, i32, Option<i64>, Option<String>)> for MemberTeamDto {
    fn from(row: (i64, Option<String>, i32, Option<i64>, Option<String>)) -> Self {
        let (member_id, username, age, team_id, team_name) = row;
        Self {
            member_id,
            username,
            age,
            team_id,
            team_name,
        }
    }
}

/// Non-empty after trimming whitespace.
fn has_text(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn username_eq(username: Option<&str>) -> Option<Predicate> {
    has_text(username).map(|u| MEMBER.username.eq(u))
}

fn team_name_eq(team_name: Option<&str>) -> Option<Predicate> {
    has_text(team_name).map(|t| TEAM.name.eq(t))
}

fn age_goe(age_goe: Option<i32>) -> Option<Predicate> {
    age_goe.map(|age| MEMBER.age.goe(age))
}

fn age_loe(age_loe: Option<i32>) -> Option<Predicate> {
    age_loe.map(|age| MEMBER.age.loe(age))
}

impl MemberSearchCondition {
    /// Every present criterion as a predicate, in a fixed order.
    pub fn predicates(&self) -> [Option<Predicate>; 4] {
        [
            username_eq(self.username.as_deref()),
            team_name_eq(self.team_name.as_deref()),
            age_goe(self.age_goe),
            age_loe(self.age_loe),
        ]
    }
}

/// Member repository for database operations
pub struct MemberRepository {
    support: RepositorySupport<QMember>,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            support: RepositorySupport::new(pool, MEMBER),
        }
    }

    fn pool(&self) -> &SqlitePool {
        self.support.factory().pool()
    }

    /// Insert a member and return it with its assigned id
    pub async fn create(&self, input: CreateMember) -> Result<Member> {
        let result = sqlx::query("INSERT INTO member (username, age, team_id) VALUES (?1, ?2, ?3)")
            .bind(&input.username)
            .bind(input.age)
            .bind(input.team_id)
            .execute(self.pool())
            .await
            .with_context(|| format!("Failed to insert member {:?}", input.username))?;

        let id = result.last_insert_rowid();
        debug!(id, username = ?input.username, "Member created");

        Ok(Member {
            id,
            username: input.username,
            age: input.age,
            team_id: input.team_id,
            team: Relation::Unloaded,
        })
    }

    /// Get a member by ID, team not loaded
    pub async fn get(&self, id: i64) -> Result<Option<Member>> {
        let member = self
            .support
            .select_from(MEMBER)
            .filter(MEMBER.id.eq(id))
            .fetch_one()
            .await?;
        Ok(member)
    }

    /// Persist the member's current field values
    pub async fn update(&self, member: &Member) -> Result<()> {
        let result =
            sqlx::query("UPDATE member SET username = ?1, age = ?2, team_id = ?3 WHERE id = ?4")
                .bind(&member.username)
                .bind(member.age)
                .bind(member.team_id)
                .bind(member.id)
                .execute(self.pool())
                .await
                .with_context(|| format!("Failed to update member {}", member.id))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Member {} does not exist", member.id);
        }
        Ok(())
    }

    /// Move a member to another team, in memory and in the database
    pub async fn change_team(&self, member: &mut Member, team: &mut Team) -> Result<()> {
        member.change_team(team);
        self.update(member).await
    }

    /// Hand-written SQL lookup; fails with `RowNotFound` when absent
    pub async fn find_by_username_raw(&self, username: &str) -> Result<Member> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT id, username, age, team_id FROM member WHERE username = ?1",
        )
        .bind(username)
        .fetch_one(self.pool())
        .await?;
        Ok(member)
    }

    /// Every member, via an explicit projection and FROM
    pub async fn find_all(&self) -> Result<Vec<Member>> {
        let members = self
            .support
            .select(MEMBER)
            .from(MEMBER)
            .order_by(MEMBER.id.asc())
            .fetch()
            .await?;
        Ok(members)
    }

    /// Every member, via `select_from`
    pub async fn find_all_from(&self) -> Result<Vec<Member>> {
        let members = self
            .support
            .select_from(MEMBER)
            .order_by(MEMBER.id.asc())
            .fetch()
            .await?;
        Ok(members)
    }

    /// Member and team columns for every member matching `condition`
    pub async fn search(&self, condition: &MemberSearchCondition) -> Result<Vec<MemberTeamDto>> {
        let rows = self
            .support
            .select((
                MEMBER.id,
                MEMBER.username,
                MEMBER.age,
                TEAM.id.nullable(),
                TEAM.name.nullable(),
            ))
            .from(MEMBER)
            .left_join(MEMBER.team, TEAM)
            .filter_all(condition.predicates())
            .order_by(MEMBER.id.asc())
            .fetch()
            .await?;
        Ok(rows.into_iter().map(MemberTeamDto::from).collect())
    }

    fn search_query(&self, condition: &MemberSearchCondition) -> SelectQuery<QMember> {
        self.support
            .select_from(MEMBER)
            .left_join(MEMBER.team, TEAM)
            .filter_all(condition.predicates())
    }

    /// One page of matching members; the total reuses the content query
    pub async fn search_page(
        &self,
        condition: &MemberSearchCondition,
        request: &PageRequest,
    ) -> Result<Page<Member>> {
        let page = self
            .support
            .apply_pagination(request, |_| self.search_query(condition))
            .await?;
        Ok(page)
    }

    /// One page of matching members; the total comes from an id-only
    /// count query
    pub async fn search_page_with_count(
        &self,
        condition: &MemberSearchCondition,
        request: &PageRequest,
    ) -> Result<Page<Member>> {
        let page = self
            .support
            .apply_pagination_with_count(
                request,
                |_| self.search_query(condition),
                |q| {
                    q.select(MEMBER.id)
                        .from(MEMBER)
                        .left_join(MEMBER.team, TEAM)
                        .filter_all(condition.predicates())
                },
            )
            .await?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_criteria_are_dropped() {
        let condition = MemberSearchCondition {
            username: Some("   ".into()),
            team_name: Some(String::new()),
            age_goe: None,
            age_loe: None,
        };
        assert!(condition.predicates().iter().all(Option::is_none));
    }

    #[test]
    fn test_present_criteria_become_predicates() {
        let condition = MemberSearchCondition {
            username: None,
            team_name: Some("teamB".into()),
            age_goe: Some(35),
            age_loe: None,
        };
        let sql: Vec<String> = condition
            .predicates()
            .into_iter()
            .flatten()
            .map(|p| p.sql().to_string())
            .collect();
        assert_eq!(sql, vec!["team.name = ?", "member.age >= ?"]);
    }
}
