//! Member and Team entities with their typed query paths

use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::orm::{
    Column, ColumnDef, ColumnRef, DatabaseEntity, DatabaseSchema, EntityPath, FetchPlan,
    ManyToOne, Projection, read,
};

/// An association that a query either materialised or left alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Relation<T> {
    Unloaded,
    Loaded(T),
}

impl<T> Relation<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Relation::Loaded(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Relation::Loaded(value) => Some(value),
            Relation::Unloaded => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Relation::Loaded(value) => Some(value),
            Relation::Unloaded => None,
        }
    }
}

impl<T> Default for Relation<T> {
    fn default() -> Self {
        Relation::Unloaded
    }
}

/// A team member. Owns the team association through `team_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub age: i32,
    pub team_id: Option<i64>,
    pub team: Relation<Option<Team>>,
}

impl Member {
    /// Loaded team, if the query fetched it and the member has one.
    pub fn team(&self) -> Option<&Team> {
        self.team.get().and_then(Option::as_ref)
    }

    /// Move this member to `team`, keeping both sides of the association in step.
    ///
    /// The team's member collection is only touched when it is loaded.
    pub fn change_team(&mut self, team: &mut Team) {
        self.team_id = Some(team.id);
        self.team = Relation::Loaded(Some(team.detached()));

        if let Some(members) = team.members.get_mut() {
            let entry = self.detached();
            match members.iter_mut().find(|m| m.id == self.id) {
                Some(existing) => *existing = entry,
                None => members.push(entry),
            }
        }
    }

    /// Copy without relations, for storing on the other side of an association.
    pub fn detached(&self) -> Member {
        Member {
            team: Relation::Unloaded,
            ..self.clone()
        }
    }
}

impl sqlx::FromRow<'_, SqliteRow> for Member {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            age: row.try_get("age")?,
            team_id: row.try_get("team_id")?,
            team: Relation::Unloaded,
        })
    }
}

impl DatabaseEntity for Member {
    const TABLE_NAME: &'static str = "member";

    fn column_names() -> &'static [&'static str] {
        &["id", "username", "age", "team_id"]
    }
}

impl DatabaseSchema for Member {
    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef {
                name: "id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: true,
                default: None,
                references: None,
            },
            ColumnDef {
                name: "username",
                sql_type: "TEXT",
                nullable: true,
                is_primary_key: false,
                default: None,
                references: None,
            },
            ColumnDef {
                name: "age",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: false,
                default: Some("0"),
                references: None,
            },
            ColumnDef {
                name: "team_id",
                sql_type: "INTEGER",
                nullable: true,
                is_primary_key: false,
                default: None,
                references: Some("team(id)"),
            },
        ];
        COLUMNS
    }
}

/// A team. `members` is the inverse side and is never written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub members: Relation<Vec<Member>>,
}

impl Team {
    pub fn detached(&self) -> Team {
        Team {
            members: Relation::Unloaded,
            ..self.clone()
        }
    }
}

impl sqlx::FromRow<'_, SqliteRow> for Team {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            members: Relation::Unloaded,
        })
    }
}

impl DatabaseEntity for Team {
    const TABLE_NAME: &'static str = "team";

    fn column_names() -> &'static [&'static str] {
        &["id", "name"]
    }
}

impl DatabaseSchema for Team {
    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef {
                name: "id",
                sql_type: "INTEGER",
                nullable: false,
                is_primary_key: true,
                default: None,
                references: None,
            },
            ColumnDef {
                name: "name",
                sql_type: "TEXT",
                nullable: false,
                is_primary_key: false,
                default: None,
                references: None,
            },
        ];
        COLUMNS
    }
}

// ============================================================================
// Query paths
// ============================================================================

/// Typed path over the `member` table.
#[derive(Debug, Clone, Copy)]
pub struct QMember {
    alias: &'static str,
    pub id: Column<i64>,
    pub username: Column<Option<String>>,
    pub age: Column<i32>,
    pub team_id: Column<Option<i64>>,
    /// Many-to-one association to [`Team`]
    pub team: ManyToOne,
}

impl QMember {
    /// A path under a custom alias, for joining `member` to itself.
    pub const fn aliased(alias: &'static str) -> Self {
        Self {
            alias,
            id: Column::new(alias, "id"),
            username: Column::new(alias, "username"),
            age: Column::new(alias, "age"),
            team_id: Column::new(alias, "team_id"),
            team: ManyToOne::new(alias, "team", "team_id", "id"),
        }
    }
}

/// Default `member` path.
pub const MEMBER: QMember = QMember::aliased("member");

impl Projection for QMember {
    type Output = Member;

    fn push_columns(&self, plan: &FetchPlan, out: &mut Vec<String>) {
        out.extend(
            Member::column_names()
                .iter()
                .map(|c| format!("{}.{}", self.alias, c)),
        );
        if let Some(team_alias) = plan.target(self.alias, self.team.name) {
            QTeam::aliased(team_alias).push_columns(plan, out);
        }
    }

    fn decode(
        &self,
        row: &SqliteRow,
        index: &mut usize,
        plan: &FetchPlan,
    ) -> Result<Member, sqlx::Error> {
        let id = read(row, index)?;
        let username = read(row, index)?;
        let age = read(row, index)?;
        let team_id = read(row, index)?;

        let team = match plan.target(self.alias, self.team.name) {
            Some(team_alias) => {
                Relation::Loaded(QTeam::aliased(team_alias).optional().decode(row, index, plan)?)
            }
            None => Relation::Unloaded,
        };

        Ok(Member {
            id,
            username,
            age,
            team_id,
            team,
        })
    }
}

impl EntityPath for QMember {
    type Entity = Member;

    fn alias(&self) -> &'static str {
        self.alias
    }

    fn property(&self, name: &str) -> Option<ColumnRef> {
        match name {
            "id" => Some(self.id.column_ref()),
            "username" => Some(self.username.column_ref()),
            "age" => Some(self.age.column_ref()),
            "teamId" | "team_id" => Some(self.team_id.column_ref()),
            _ => None,
        }
    }
}

/// Typed path over the `team` table.
#[derive(Debug, Clone, Copy)]
pub struct QTeam {
    alias: &'static str,
    pub id: Column<i64>,
    pub name: Column<String>,
}

impl QTeam {
    pub const fn aliased(alias: &'static str) -> Self {
        Self {
            alias,
            id: Column::new(alias, "id"),
            name: Column::new(alias, "name"),
        }
    }
}

/// Default `team` path.
pub const TEAM: QTeam = QTeam::aliased("team");

impl Projection for QTeam {
    type Output = Team;

    fn push_columns(&self, _plan: &FetchPlan, out: &mut Vec<String>) {
        out.extend(
            Team::column_names()
                .iter()
                .map(|c| format!("{}.{}", self.alias, c)),
        );
    }

    fn decode(
        &self,
        row: &SqliteRow,
        index: &mut usize,
        _plan: &FetchPlan,
    ) -> Result<Team, sqlx::Error> {
        Ok(Team {
            id: read(row, index)?,
            name: read(row, index)?,
            members: Relation::Unloaded,
        })
    }
}

impl EntityPath for QTeam {
    type Entity = Team;

    fn alias(&self) -> &'static str {
        self.alias
    }

    fn property(&self, name: &str) -> Option<ColumnRef> {
        match name {
            "id" => Some(self.id.column_ref()),
            "name" => Some(self.name.column_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::orm::Order;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn member(id: i64, name: &str) -> Member {
        Member {
            id,
            username: Some(name.to_string()),
            age: 20,
            team_id: None,
            team: Relation::Unloaded,
        }
    }

    #[test]
    fn test_change_team_updates_both_sides() {
        let mut team = Team {
            id: 7,
            name: "teamA".into(),
            members: Relation::Loaded(Vec::new()),
        };
        let mut m = member(1, "member1");

        m.change_team(&mut team);
        m.change_team(&mut team);

        assert_eq!(m.team_id, Some(7));
        assert_eq!(m.team().map(|t| t.name.as_str()), Some("teamA"));
        let members = team.members.get().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, 1);
        assert!(!members[0].team.is_loaded());
    }

    #[test]
    fn test_change_team_leaves_unloaded_collection_alone() {
        let mut team = Team {
            id: 3,
            name: "teamB".into(),
            members: Relation::Unloaded,
        };
        let mut m = member(2, "member2");
        m.change_team(&mut team);

        assert_eq!(m.team_id, Some(3));
        assert!(!team.members.is_loaded());
    }

    #[test]
    fn test_sort_properties_map_to_columns() {
        let order = MEMBER.order_for(&Order::asc("username").nulls_last()).unwrap();
        assert_eq!(order.to_sql(), "member.username ASC NULLS LAST");

        let order = QMember::aliased("m").order_for(&Order::desc("age")).unwrap();
        assert_eq!(order.to_sql(), "m.age DESC");

        assert_matches!(
            TEAM.order_for(&Order::asc("budget")),
            Err(QueryError::UnknownProperty { entity: "team", .. })
        );
    }

    #[test]
    fn test_fetch_plan_adds_team_columns() {
        let mut plan = FetchPlan::default();
        assert_eq!(MEMBER.column_count(&plan), 4);

        plan.add("member", "team", "team");
        let mut columns = Vec::new();
        MEMBER.push_columns(&plan, &mut columns);
        assert_eq!(
            columns,
            vec![
                "member.id",
                "member.username",
                "member.age",
                "member.team_id",
                "team.id",
                "team.name"
            ]
        );
    }
}
