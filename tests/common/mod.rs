//! Shared fixture: an in-memory database holding the sample roster

#![allow(dead_code)]

use rosterql::db::{Database, SeedResult, seed_sample_data};

pub async fn empty_db() -> Database {
    let db = Database::connect("sqlite::memory:", 1)
        .await
        .expect("connect to in-memory database");
    let sync = db.sync_schema().await;
    assert!(sync.is_ok(), "schema sync failed: {:?}", sync.errors);
    db
}

/// teamA: member1 (10), member2 (20); teamB: member3 (30), member4 (40)
pub async fn seeded_db() -> (Database, SeedResult) {
    let db = empty_db().await;
    let seeded = seed_sample_data(&db).await.expect("seed sample data");
    assert_eq!(seeded.members.len(), 4);
    (db, seeded)
}

pub fn usernames(members: &[rosterql::db::Member]) -> Vec<&str> {
    members
        .iter()
        .map(|m| m.username.as_deref().unwrap_or("<null>"))
        .collect()
}
