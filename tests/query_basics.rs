//! Integration tests for typed queries against the sample roster
//!
//! Covers lookups, predicate composition, sorting, paging, aggregation and
//! every join flavour (inner, left, theta, fetch).

mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use rosterql::QueryError;
use rosterql::db::{CreateMember, Database, MEMBER, Member, TEAM, seed_sample_data};
use rosterql::orm::{EntityPath, Order, Predicate, Sort};

use common::{seeded_db, usernames};

async fn add_member(db: &Database, username: Option<&str>, age: i32) -> Member {
    db.members()
        .create(CreateMember::new(username, age))
        .await
        .expect("insert member")
}

// ============================================================================
// Lookups and predicates
// ============================================================================

#[tokio::test]
async fn test_raw_sql_lookup() {
    let (db, _) = seeded_db().await;

    let member = db.members().find_by_username_raw("member1").await.unwrap();
    assert_eq!(member.username.as_deref(), Some("member1"));
    assert_eq!(member.age, 10);
    assert!(!member.team.is_loaded());

    let missing = db.members().find_by_username_raw("nobody").await.unwrap_err();
    assert_matches!(
        missing.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::RowNotFound)
    );
}

#[tokio::test]
async fn test_typed_lookup() {
    let (db, _) = seeded_db().await;

    let member = db
        .query_factory()
        .select_from(MEMBER)
        .filter(MEMBER.username.eq("member1"))
        .fetch_one()
        .await
        .unwrap()
        .expect("member1 exists");
    assert_eq!(member.age, 10);

    let none = db
        .query_factory()
        .select_from(MEMBER)
        .filter(MEMBER.username.eq("nobody"))
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(none, None);
}

#[tokio::test]
async fn test_search_with_and_between() {
    let (db, _) = seeded_db().await;

    let found = db
        .query_factory()
        .select_from(MEMBER)
        .filter(MEMBER.username.eq("member1").and(MEMBER.age.between(10, 30)))
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(found.map(|m| m.age), Some(10));
}

#[tokio::test]
async fn test_variadic_filter_skips_absent_conditions() {
    let (db, _) = seeded_db().await;

    let found = db
        .query_factory()
        .select_from(MEMBER)
        .filter_all([
            Some(MEMBER.username.eq("member1")),
            None,
            Some(MEMBER.age.eq(10)),
        ])
        .fetch()
        .await
        .unwrap();
    assert_eq!(usernames(&found), vec!["member1"]);

    // All absent: no WHERE clause at all
    let all = db
        .query_factory()
        .select_from(MEMBER)
        .filter(Predicate::all([None, None]))
        .fetch()
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_or_not_and_list_predicates() {
    let (db, _) = seeded_db().await;
    let factory = db.query_factory();

    let either = factory
        .select_from(MEMBER)
        .filter(MEMBER.age.eq(10).or(MEMBER.age.eq(40)))
        .order_by(MEMBER.age.asc())
        .fetch()
        .await
        .unwrap();
    assert_eq!(usernames(&either), vec!["member1", "member4"]);

    let others = factory
        .select_from(MEMBER)
        .filter(MEMBER.age.in_list([10, 40]).not())
        .order_by(MEMBER.age.asc())
        .fetch()
        .await
        .unwrap();
    assert_eq!(usernames(&others), vec!["member2", "member3"]);

    let nothing = factory
        .select_from(MEMBER)
        .filter(MEMBER.age.in_list(Vec::<i32>::new()))
        .fetch()
        .await
        .unwrap();
    assert!(nothing.is_empty());

    let like = factory
        .select_from(MEMBER)
        .filter(MEMBER.username.contains("ber3"))
        .fetch()
        .await
        .unwrap();
    assert_eq!(usernames(&like), vec!["member3"]);
}

#[tokio::test]
async fn test_fetch_variants() {
    let (db, _) = seeded_db().await;
    let factory = db.query_factory();

    let all = factory.select_from(MEMBER).fetch().await.unwrap();
    assert_eq!(all.len(), 4);

    let first = factory
        .select_from(MEMBER)
        .order_by(MEMBER.age.desc())
        .fetch_first()
        .await
        .unwrap();
    assert_eq!(first.map(|m| m.age), Some(40));

    let total = factory.select_from(MEMBER).fetch_count().await.unwrap();
    assert_eq!(total, 4);

    let counted = factory
        .select(MEMBER.count())
        .from(MEMBER)
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(counted, Some(4));
}

#[tokio::test]
async fn test_fetch_one_rejects_multiple_rows() {
    let (db, _) = seeded_db().await;

    let result = db.query_factory().select_from(MEMBER).fetch_one().await;
    assert_matches!(result, Err(QueryError::NonUniqueResult { at_least: 2 }));

    // A wider caller limit is still capped at two rows
    let result = db
        .query_factory()
        .select_from(MEMBER)
        .limit(10)
        .fetch_one()
        .await;
    assert_matches!(result, Err(QueryError::NonUniqueResult { at_least: 2 }));

    let narrowed = db
        .query_factory()
        .select_from(MEMBER)
        .order_by(MEMBER.age.asc())
        .limit(1)
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(narrowed.map(|m| m.age), Some(10));
}

// ============================================================================
// Sorting and paging
// ============================================================================

#[tokio::test]
async fn test_sort_age_desc_username_asc_nulls_last() {
    let (db, _) = seeded_db().await;
    add_member(&db, None, 100).await;
    add_member(&db, Some("member5"), 100).await;
    add_member(&db, Some("member6"), 100).await;

    let result = db
        .query_factory()
        .select_from(MEMBER)
        .filter(MEMBER.age.eq(100))
        .order_by(MEMBER.age.desc())
        .order_by(MEMBER.username.asc().nulls_last())
        .fetch()
        .await
        .unwrap();

    assert_eq!(usernames(&result), vec!["member5", "member6", "<null>"]);
    assert_eq!(result[2].username, None);
}

#[tokio::test]
async fn test_paging_offset_and_limit() {
    let (db, _) = seeded_db().await;

    let query = db
        .query_factory()
        .select_from(MEMBER)
        .order_by(MEMBER.username.desc())
        .offset(1)
        .limit(2);

    let result = query.fetch().await.unwrap();
    assert_eq!(usernames(&result), vec!["member3", "member2"]);

    // Counting ignores offset and limit
    assert_eq!(query.fetch_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_offset_without_limit() {
    let (db, _) = seeded_db().await;

    let result = db
        .query_factory()
        .select_from(MEMBER)
        .order_by(MEMBER.age.asc())
        .offset(3)
        .fetch()
        .await
        .unwrap();
    assert_eq!(usernames(&result), vec!["member4"]);
}

#[tokio::test]
async fn test_order_by_sort_property_names() {
    let (db, _) = seeded_db().await;

    let sort = Sort::by([Order::desc("teamId"), Order::asc("age")]);
    let result = db
        .query_factory()
        .select_from(MEMBER)
        .order_by_sort(MEMBER, &sort)
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(
        usernames(&result),
        vec!["member3", "member4", "member1", "member2"]
    );

    let unknown = db
        .query_factory()
        .select_from(MEMBER)
        .order_by_sort(MEMBER, &Sort::by([Order::asc("nickname")]));
    assert_matches!(unknown.err(), Some(QueryError::UnknownProperty { .. }));
}

#[tokio::test]
async fn test_generated_sql() {
    let (db, _) = seeded_db().await;

    let query = db
        .query_factory()
        .select_from(MEMBER)
        .left_join(MEMBER.team, TEAM)
        .on(TEAM.name.eq("teamA"))
        .filter(MEMBER.age.goe(10))
        .order_by(MEMBER.id.asc())
        .offset(2)
        .limit(5);

    let (sql, values) = query.to_sql();
    assert_eq!(
        sql,
        "SELECT member.id, member.username, member.age, member.team_id \
         FROM member AS member \
         LEFT JOIN team AS team ON (member.team_id = team.id AND team.name = ?1) \
         WHERE member.age >= ?2 ORDER BY member.id ASC LIMIT 5 OFFSET 2"
    );
    assert_eq!(values.len(), 2);

    let (count_sql, _) = query.to_count_sql();
    assert_eq!(
        count_sql,
        "SELECT COUNT(*) FROM member AS member \
         LEFT JOIN team AS team ON (member.team_id = team.id AND team.name = ?1) \
         WHERE member.age >= ?2"
    );

    // Both run against the seeded roster
    let page = query.fetch().await.unwrap();
    assert_eq!(usernames(&page), vec!["member3", "member4"]);
    assert_eq!(query.fetch_count().await.unwrap(), 4);
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_aggregation() {
    let (db, _) = seeded_db().await;

    let row = db
        .query_factory()
        .select((
            MEMBER.count(),
            MEMBER.age.sum(),
            MEMBER.age.avg(),
            MEMBER.age.min(),
            MEMBER.age.max(),
        ))
        .from(MEMBER)
        .fetch_one()
        .await
        .unwrap();

    assert_eq!(row, Some((4, Some(100), Some(25.0), Some(10), Some(40))));
}

#[tokio::test]
async fn test_aggregation_over_no_rows() {
    let db = common::empty_db().await;

    let row = db
        .query_factory()
        .select((MEMBER.age.count(), MEMBER.age.sum(), MEMBER.age.max()))
        .from(MEMBER)
        .fetch_one()
        .await
        .unwrap();

    assert_eq!(row, Some((0, None, None)));
}

#[tokio::test]
async fn test_group_by_team_name() {
    let (db, _) = seeded_db().await;

    let query = db
        .query_factory()
        .select((TEAM.name, MEMBER.age.avg()))
        .from(MEMBER)
        .join(MEMBER.team, TEAM)
        .group_by(TEAM.name)
        .order_by(TEAM.name.asc());

    let rows = query.fetch().await.unwrap();
    assert_eq!(
        rows,
        vec![
            ("teamA".to_string(), Some(15.0)),
            ("teamB".to_string(), Some(35.0)),
        ]
    );

    // Grouped queries count groups, not members
    assert_eq!(query.fetch_count().await.unwrap(), 2);

    let older = query
        .having(MEMBER.age.avg().gt(20.0))
        .fetch()
        .await
        .unwrap();
    assert_eq!(older, vec![("teamB".to_string(), Some(35.0))]);
}

// ============================================================================
// Joins
// ============================================================================

#[tokio::test]
async fn test_inner_join() {
    let (db, _) = seeded_db().await;

    let result = db
        .query_factory()
        .select_from(MEMBER)
        .join(MEMBER.team, TEAM)
        .filter(TEAM.name.eq("teamA"))
        .order_by(MEMBER.id.asc())
        .fetch()
        .await
        .unwrap();

    assert_eq!(usernames(&result), vec!["member1", "member2"]);
    // A plain join filters but does not load the association
    assert!(result.iter().all(|m| !m.team.is_loaded()));
}

#[tokio::test]
async fn test_theta_join() {
    let (db, _) = seeded_db().await;
    add_member(&db, Some("teamA"), 0).await;
    add_member(&db, Some("teamB"), 0).await;
    add_member(&db, Some("teamC"), 0).await;

    let result = db
        .query_factory()
        .select_from(MEMBER)
        .from_also(TEAM)
        .filter(MEMBER.username.eq_column(&TEAM.name))
        .order_by(MEMBER.id.asc())
        .fetch()
        .await
        .unwrap();

    assert_eq!(usernames(&result), vec!["teamA", "teamB"]);
}

#[tokio::test]
async fn test_left_join_with_on_filter() {
    let (db, _) = seeded_db().await;

    let rows = db
        .query_factory()
        .select((MEMBER, TEAM.optional()))
        .from(MEMBER)
        .left_join(MEMBER.team, TEAM)
        .on(TEAM.name.eq("teamA"))
        .order_by(MEMBER.id.asc())
        .fetch()
        .await
        .unwrap();

    let summary: Vec<(Option<String>, Option<String>)> = rows
        .into_iter()
        .map(|(member, team)| (member.username, team.map(|t| t.name)))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Some("member1".into()), Some("teamA".into())),
            (Some("member2".into()), Some("teamA".into())),
            (Some("member3".into()), None),
            (Some("member4".into()), None),
        ]
    );
}

#[tokio::test]
async fn test_left_join_unrelated_entity() {
    let (db, _) = seeded_db().await;
    add_member(&db, Some("teamA"), 0).await;
    add_member(&db, Some("teamB"), 0).await;
    add_member(&db, Some("teamC"), 0).await;

    let rows = db
        .query_factory()
        .select((MEMBER, TEAM.optional()))
        .from(MEMBER)
        .left_join_entity(TEAM)
        .on(MEMBER.username.eq_column(&TEAM.name))
        .order_by(MEMBER.id.asc())
        .fetch()
        .await
        .unwrap();

    assert_eq!(rows.len(), 7);
    let matched: Vec<&str> = rows
        .iter()
        .filter_map(|(_, team)| team.as_ref().map(|t| t.name.as_str()))
        .collect();
    assert_eq!(matched, vec!["teamA", "teamB"]);
}

#[tokio::test]
async fn test_fetch_join_not_loaded() {
    let (db, _) = seeded_db().await;

    let member = db
        .query_factory()
        .select_from(MEMBER)
        .filter(MEMBER.username.eq("member1"))
        .fetch_one()
        .await
        .unwrap()
        .expect("member1 exists");

    assert!(!member.team.is_loaded());
    assert_eq!(member.team(), None);
    assert!(member.team_id.is_some());
}

#[tokio::test]
async fn test_fetch_join_loaded() {
    let (db, _) = seeded_db().await;

    let member = db
        .query_factory()
        .select_from(MEMBER)
        .join(MEMBER.team, TEAM)
        .fetch_join()
        .filter(MEMBER.username.eq("member1"))
        .fetch_one()
        .await
        .unwrap()
        .expect("member1 exists");

    assert!(member.team.is_loaded());
    assert_eq!(member.team().map(|t| t.name.as_str()), Some("teamA"));
    assert_eq!(member.team().map(|t| t.id), member.team_id);
}

#[tokio::test]
async fn test_left_fetch_join_keeps_teamless_members() {
    let (db, _) = seeded_db().await;
    add_member(&db, Some("loner"), 50).await;

    let members = db
        .query_factory()
        .select_from(MEMBER)
        .left_join(MEMBER.team, TEAM)
        .fetch_join()
        .order_by(MEMBER.id.asc())
        .fetch()
        .await
        .unwrap();

    assert_eq!(members.len(), 5);
    assert!(members.iter().all(|m| m.team.is_loaded()));
    let loner = &members[4];
    assert_eq!(loner.username.as_deref(), Some("loner"));
    assert_eq!(loner.team(), None);
}

// ============================================================================
// Storage
// ============================================================================

#[tokio::test]
async fn test_file_backed_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("roster.db").display());

    {
        let db = Database::connect(&url, 2).await.unwrap();
        assert!(db.sync_schema().await.is_ok());
        let seeded = seed_sample_data(&db).await.unwrap();
        assert_eq!(seeded.teams.len(), 2);
        db.close().await;
    }

    let db = Database::connect(&url, 2).await.unwrap();
    let sync = db.sync_schema().await;
    assert!(sync.is_ok());
    assert!(sync.tables_created.is_empty());

    // Existing rows are left alone
    let again = seed_sample_data(&db).await.unwrap();
    assert!(again.is_empty());

    let total = db
        .query_factory()
        .select_from(MEMBER)
        .fetch_count()
        .await
        .unwrap();
    assert_eq!(total, 4);
    db.close().await;
}
