//! Automatic schema synchronization from entity definitions
//!
//! - Compares entity definitions to current database schema
//! - Creates missing tables automatically
//! - Adds missing columns automatically
//! - Does NOT handle column renames or type changes

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::entities::{Member, Team};
use crate::orm::{ColumnDef, DatabaseSchema};

/// Result of a schema sync operation
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<(String, String)>, // (table, column)
    pub errors: Vec<String>,
}

impl SchemaSyncResult {
    fn merge(&mut self, other: SchemaSyncResult) {
        self.tables_created.extend(other.tables_created);
        self.columns_added.extend(other.columns_added);
        self.errors.extend(other.errors);
    }

    fn fail(&mut self, msg: String) {
        warn!("{}", msg);
        self.errors.push(msg);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check if a table exists in the database
async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool, sqlx::Error> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?;

    Ok(result.is_some())
}

/// Get existing columns for a table
async fn get_table_columns(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(i32, String, String, i32, Option<String>, i32)> =
        sqlx::query_as(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(_, name, _, _, _, _)| name).collect())
}

/// Sync a single entity's table to the database
pub async fn sync_entity<E: DatabaseSchema>(
    pool: &SqlitePool,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();
    let table = E::TABLE_NAME;

    if !table_exists(pool, table).await? {
        let create_sql = E::create_table_sql();
        debug!(table, sql = %create_sql, "Creating table");
        match sqlx::query(&create_sql).execute(pool).await {
            Ok(_) => {
                info!(table, "Created table");
                result.tables_created.push(table.to_string());
            }
            Err(e) => result.fail(format!("Failed to create table {}: {}", table, e)),
        }
        return Ok(result);
    }

    let existing = get_table_columns(pool, table).await?;
    let missing = E::columns()
        .iter()
        .filter(|def| !existing.iter().any(|name| name == def.name));

    for def in missing {
        let alter_sql = generate_add_column_sql(table, def);
        debug!(table, sql = %alter_sql, "Adding column");
        match sqlx::query(&alter_sql).execute(pool).await {
            Ok(_) => {
                info!(table, column = def.name, "Added column");
                result
                    .columns_added
                    .push((table.to_string(), def.name.to_string()));
            }
            Err(e) => {
                result.fail(format!("Failed to add column {}.{}: {}", table, def.name, e))
            }
        }
    }

    Ok(result)
}

/// ALTER TABLE for a missing column.
///
/// SQLite cannot add a NOT NULL column without a default, so such columns
/// are added as nullable.
fn generate_add_column_sql(table_name: &str, col_def: &ColumnDef) -> String {
    let mut def = col_def.clone();
    if !def.nullable && def.default.is_none() {
        def.nullable = true;
    }
    format!("ALTER TABLE {} ADD COLUMN {}", table_name, def.to_sql())
}

/// Sync every entity table, referenced tables first.
pub async fn sync_all_entity_schemas(pool: &SqlitePool) -> SchemaSyncResult {
    let mut result = SchemaSyncResult::default();

    let outcomes = [
        ("team", sync_entity::<Team>(pool).await),
        ("member", sync_entity::<Member>(pool).await),
    ];

    for (table, outcome) in outcomes {
        match outcome {
            Ok(r) => result.merge(r),
            Err(e) => result.fail(format!("Failed to sync {}: {}", table, e)),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_column_relaxes_not_null_without_default() {
        let col = ColumnDef {
            name: "nickname",
            sql_type: "TEXT",
            nullable: false,
            is_primary_key: false,
            default: None,
            references: None,
        };
        assert_eq!(
            generate_add_column_sql("member", &col),
            "ALTER TABLE member ADD COLUMN nickname TEXT"
        );
    }

    #[tokio::test]
    async fn test_sync_adds_missing_column_to_existing_table() {
        let db = crate::db::Database::connect("sqlite::memory:", 1)
            .await
            .unwrap();
        // member as it looked before teams existed
        sqlx::query(
            "CREATE TABLE member (id INTEGER PRIMARY KEY, username TEXT, \
             age INTEGER NOT NULL DEFAULT 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO member (username, age) VALUES ('veteran', 60)")
            .execute(db.pool())
            .await
            .unwrap();

        let result = sync_all_entity_schemas(db.pool()).await;
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.tables_created, vec!["team".to_string()]);
        assert_eq!(
            result.columns_added,
            vec![("member".to_string(), "team_id".to_string())]
        );

        let columns = get_table_columns(db.pool(), "member").await.unwrap();
        assert_eq!(columns, vec!["id", "username", "age", "team_id"]);

        // Existing rows survive with the new column unset
        let team_id: Option<i64> =
            sqlx::query_scalar("SELECT team_id FROM member WHERE username = 'veteran'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(team_id, None);

        let again = sync_all_entity_schemas(db.pool()).await;
        assert!(again.tables_created.is_empty() && again.columns_added.is_empty());
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            Team::create_table_sql(),
            "CREATE TABLE IF NOT EXISTS team (\n  id INTEGER PRIMARY KEY,\n  name TEXT NOT NULL\n)"
        );
    }
}
