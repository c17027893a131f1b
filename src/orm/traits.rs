//! Core traits for the query layer
//!
//! Entities describe their table through [`DatabaseEntity`] and
//! [`DatabaseSchema`]; column values cross the driver boundary as
//! [`SqlValue`] on the way in and as [`SqlType`] implementors on the way out.

use sqlx::Sqlite;
use sqlx::sqlite::SqliteArguments;

/// Column definition for schema generation.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// SQLite column type (TEXT, INTEGER, REAL, BLOB)
    pub sql_type: &'static str,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub is_primary_key: bool,
    /// Default value expression (e.g., "0")
    pub default: Option<&'static str>,
    /// Referenced `table(column)` for foreign keys
    pub references: Option<&'static str>,
}

impl ColumnDef {
    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);

        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }

        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        if let Some(target) = self.references {
            sql.push_str(&format!(" REFERENCES {}", target));
        }

        sql
    }
}

/// Metadata about a database entity (table).
pub trait DatabaseEntity: Sized + Send + Sync {
    /// The SQL table name (e.g., "member")
    const TABLE_NAME: &'static str;

    /// The primary key column name
    const PRIMARY_KEY: &'static str = "id";

    /// List of all column names in the table, in projection order
    fn column_names() -> &'static [&'static str];
}

/// Table layout used by schema sync.
pub trait DatabaseSchema: DatabaseEntity {
    /// Get all column definitions for this entity's table
    fn columns() -> &'static [ColumnDef];

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    fn create_table_sql() -> String {
        let column_defs: Vec<String> = Self::columns().iter().map(|c| c.to_sql()).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            Self::TABLE_NAME,
            column_defs.join(",\n  ")
        )
    }
}

/// Represents a SQL value that can be bound to a query.
///
/// Predicates collect these in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value as the next positional parameter
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A Rust type a column decodes into.
///
/// `Param` is the type accepted on the comparison side (an `Option<String>`
/// column is still compared against a `String`); `Nullable` is what the
/// column decodes into when it may come back NULL (outer joins, MIN/MAX).
pub trait SqlType:
    for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite> + Send + Sync + Unpin + 'static
{
    type Param: Into<SqlValue>;
    type Nullable: SqlType<Param = Self::Param>;
}

impl SqlType for String {
    type Param = String;
    type Nullable = Option<String>;
}

impl SqlType for i32 {
    type Param = i32;
    type Nullable = Option<i32>;
}

impl SqlType for i64 {
    type Param = i64;
    type Nullable = Option<i64>;
}

impl SqlType for f64 {
    type Param = f64;
    type Nullable = Option<f64>;
}

impl SqlType for bool {
    type Param = bool;
    type Nullable = Option<bool>;
}

impl<T> SqlType for Option<T>
where
    T: SqlType<Nullable = Option<T>>,
{
    type Param = T::Param;
    type Nullable = Option<T>;
}

/// Column types that SUM and AVG accept.
pub trait Numeric: SqlType {
    /// Type SQLite produces for SUM over this column
    type Sum: SqlType;
}

impl Numeric for i32 {
    type Sum = i64;
}

impl Numeric for i64 {
    type Sum = i64;
}

impl Numeric for f64 {
    type Sum = f64;
}

/// Sort direction for ORDER BY clauses.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum OrderDirection {
    /// Ascending order (A-Z, 1-9)
    #[default]
    Asc,
    /// Descending order (Z-A, 9-1)
    Desc,
}

impl OrderDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Placement of NULLs within an ordering.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum NullHandling {
    /// Whatever the database does (SQLite sorts NULL first ascending)
    #[default]
    Native,
    NullsFirst,
    NullsLast,
}

impl NullHandling {
    pub fn to_sql(&self) -> Option<&'static str> {
        match self {
            NullHandling::Native => None,
            NullHandling::NullsFirst => Some("NULLS FIRST"),
            NullHandling::NullsLast => Some("NULLS LAST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_def_sql() {
        let col = ColumnDef {
            name: "team_id",
            sql_type: "INTEGER",
            nullable: true,
            is_primary_key: false,
            default: None,
            references: Some("team(id)"),
        };
        assert_eq!(col.to_sql(), "team_id INTEGER REFERENCES team(id)");

        let col = ColumnDef {
            name: "age",
            sql_type: "INTEGER",
            nullable: false,
            is_primary_key: false,
            default: Some("0"),
            references: None,
        };
        assert_eq!(col.to_sql(), "age INTEGER NOT NULL DEFAULT 0");
    }

    #[test]
    fn test_optional_values_become_null() {
        assert_eq!(SqlValue::from(None::<i32>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("a")), SqlValue::String("a".into()));
        assert_eq!(SqlValue::from(7i32), SqlValue::Int(7));
    }
}
