//! Sample roster: two teams with two members each

use anyhow::Result;
use tracing::info;

use super::Database;
use super::entities::{Member, Team};
use super::members::CreateMember;

/// Rows inserted by [`seed_sample_data`].
#[derive(Debug, Clone, Default)]
pub struct SeedResult {
    pub teams: Vec<Team>,
    pub members: Vec<Member>,
}

impl SeedResult {
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.members.is_empty()
    }
}

/// Insert teamA (member1 aged 10, member2 aged 20) and teamB (member3 aged
/// 30, member4 aged 40). Does nothing when any team already exists.
pub async fn seed_sample_data(db: &Database) -> Result<SeedResult> {
    let teams = db.teams();
    if !teams.find_all().await?.is_empty() {
        info!("Teams already present, skipping sample data");
        return Ok(SeedResult::default());
    }

    let team_a = teams.create("teamA").await?;
    let team_b = teams.create("teamB").await?;

    let roster = [
        ("member1", 10, &team_a),
        ("member2", 20, &team_a),
        ("member3", 30, &team_b),
        ("member4", 40, &team_b),
    ];

    let members_repo = db.members();
    let mut members = Vec::with_capacity(roster.len());
    for (username, age, team) in roster {
        let member = members_repo
            .create(CreateMember::new(Some(username), age).with_team(team.id))
            .await?;
        members.push(member);
    }

    info!(
        teams = 2,
        members = members.len(),
        "Sample data seeded"
    );

    Ok(SeedResult {
        teams: vec![team_a, team_b],
        members,
    })
}
