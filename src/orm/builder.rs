//! SQL query builder for typed entity paths
//!
//! Builds parameterized SELECT statements (joins, filters, grouping,
//! ordering, offset/limit) and executes them via sqlx, decoding rows
//! through the query's [`Projection`].

use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::expr::{Expression, ManyToOne, OrderSpecifier, Predicate};
use super::pagination::Sort;
use super::projection::{EntityPath, FetchPlan, Projection};
use super::traits::SqlValue;
use crate::error::{QueryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn to_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct FromItem {
    table: &'static str,
    alias: &'static str,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    target: FromItem,
    association: Option<ManyToOne>,
    on: Option<Predicate>,
    fetch: bool,
}

impl Join {
    fn condition(&self) -> Option<Predicate> {
        let implied = self
            .association
            .map(|a| Predicate::raw(a.join_condition(self.target.alias)));
        match (implied, self.on.clone()) {
            (Some(implied), on) => Some(implied.and(on)),
            (None, on) => on,
        }
    }
}

/// A SELECT statement under construction.
///
/// Cheap to clone; the pool handle is reference counted. Executing does not
/// consume the query, so the same query can back both a page and its count.
#[derive(Clone)]
pub struct SelectQuery<P: Projection> {
    pool: SqlitePool,
    projection: P,
    from: Vec<FromItem>,
    joins: Vec<Join>,
    where_clauses: Vec<Predicate>,
    group_by: Vec<String>,
    having: Vec<Predicate>,
    order_by: Vec<OrderSpecifier>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<P: Projection> SelectQuery<P> {
    /// Create a query selecting `projection`; add FROM items with [`Self::from`].
    pub fn new(pool: SqlitePool, projection: P) -> Self {
        Self {
            pool,
            projection,
            from: Vec::new(),
            joins: Vec::new(),
            where_clauses: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Add a FROM item. Several FROM items form a cross product (theta join).
    pub fn from<Q: EntityPath>(mut self, entity: Q) -> Self {
        self.from.push(FromItem {
            table: entity.table(),
            alias: entity.alias(),
        });
        self
    }

    /// Alias of [`Self::from`] that reads better after the first FROM item.
    pub fn from_also<Q: EntityPath>(self, entity: Q) -> Self {
        self.from(entity)
    }

    /// Inner join along a many-to-one association.
    pub fn join<Q: EntityPath>(self, association: ManyToOne, target: Q) -> Self {
        self.push_join(JoinKind::Inner, Some(association), target)
    }

    pub fn inner_join<Q: EntityPath>(self, association: ManyToOne, target: Q) -> Self {
        self.join(association, target)
    }

    /// Left outer join along a many-to-one association.
    pub fn left_join<Q: EntityPath>(self, association: ManyToOne, target: Q) -> Self {
        self.push_join(JoinKind::Left, Some(association), target)
    }

    /// Inner join on an entity without a declared association; give the
    /// condition with [`Self::on`].
    pub fn join_entity<Q: EntityPath>(self, target: Q) -> Self {
        self.push_join(JoinKind::Inner, None, target)
    }

    /// Left outer join on an entity without a declared association.
    pub fn left_join_entity<Q: EntityPath>(self, target: Q) -> Self {
        self.push_join(JoinKind::Left, None, target)
    }

    fn push_join<Q: EntityPath>(
        mut self,
        kind: JoinKind,
        association: Option<ManyToOne>,
        target: Q,
    ) -> Self {
        self.joins.push(Join {
            kind,
            target: FromItem {
                table: target.table(),
                alias: target.alias(),
            },
            association,
            on: None,
            fetch: false,
        });
        self
    }

    /// Extra condition on the most recent join. Ignored without a join.
    pub fn on(mut self, condition: impl Into<Option<Predicate>>) -> Self {
        if let (Some(join), Some(condition)) = (self.joins.last_mut(), condition.into()) {
            join.on = Some(match join.on.take() {
                Some(existing) => existing.and(condition),
                None => condition,
            });
        }
        self
    }

    /// Materialise the most recent association join into the selected entity.
    pub fn fetch_join(mut self) -> Self {
        if let Some(join) = self.joins.last_mut() {
            if join.association.is_some() {
                join.fetch = true;
            }
        }
        self
    }

    /// Add a WHERE condition; `None` adds nothing.
    pub fn filter(mut self, condition: impl Into<Option<Predicate>>) -> Self {
        if let Some(condition) = condition.into() {
            self.where_clauses.push(condition);
        }
        self
    }

    /// Add every present condition, skipping `None`.
    pub fn filter_all<I>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = Option<Predicate>>,
    {
        self.where_clauses.extend(conditions.into_iter().flatten());
        self
    }

    pub fn group_by(mut self, expr: impl Expression) -> Self {
        self.group_by.push(expr.to_sql());
        self
    }

    pub fn having(mut self, condition: impl Into<Option<Predicate>>) -> Self {
        if let Some(condition) = condition.into() {
            self.having.push(condition);
        }
        self
    }

    pub fn order_by(mut self, order: OrderSpecifier) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn order_by_all(mut self, orders: impl IntoIterator<Item = OrderSpecifier>) -> Self {
        self.order_by.extend(orders);
        self
    }

    /// Order by property names resolved through `root`.
    pub fn order_by_sort<Q: EntityPath>(self, root: Q, sort: &Sort) -> Result<Self> {
        let orders = sort
            .orders()
            .iter()
            .map(|order| root.order_for(order))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.order_by_all(orders))
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn fetch_plan(&self) -> FetchPlan {
        let mut plan = FetchPlan::default();
        for join in self.joins.iter().filter(|j| j.fetch) {
            if let Some(association) = join.association {
                plan.add(
                    association.source_alias,
                    association.name,
                    join.target.alias,
                );
            }
        }
        plan
    }

    /// FROM, JOIN and WHERE clauses with their values.
    fn push_body(&self, sql: &mut String, values: &mut Vec<SqlValue>) {
        let from: Vec<String> = self
            .from
            .iter()
            .map(|f| format!("{} AS {}", f.table, f.alias))
            .collect();
        sql.push_str(" FROM ");
        sql.push_str(&from.join(", "));

        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} AS {}",
                join.kind.to_sql(),
                join.target.table,
                join.target.alias
            ));
            if let Some(condition) = join.condition() {
                let (condition_sql, condition_values) = condition.into_parts();
                sql.push_str(" ON ");
                sql.push_str(&condition_sql);
                values.extend(condition_values);
            }
        }

        push_conditions(sql, values, " WHERE ", &self.where_clauses);

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        push_conditions(sql, values, " HAVING ", &self.having);
    }

    /// Build the SQL query string and its bind values.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let plan = self.fetch_plan();
        let mut columns = Vec::new();
        self.projection.push_columns(&plan, &mut columns);

        let mut sql = format!("SELECT {}", columns.join(", "));
        let mut values = Vec::new();
        self.push_body(&mut sql, &mut values);

        if !self.order_by.is_empty() {
            let orders: Vec<String> = self.order_by.iter().map(|o| o.to_sql()).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
            }
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
            }
            _ => {}
        }

        (number_params(&sql), values)
    }

    /// Build the COUNT statement: same FROM/JOIN/WHERE, no ordering or paging.
    pub fn to_count_sql(&self) -> (String, Vec<SqlValue>) {
        let mut values = Vec::new();
        let sql = if self.group_by.is_empty() {
            let mut sql = String::from("SELECT COUNT(*)");
            self.push_body(&mut sql, &mut values);
            sql
        } else {
            let mut inner = String::from("SELECT 1");
            self.push_body(&mut inner, &mut values);
            format!("SELECT COUNT(*) FROM ({})", inner)
        };
        (number_params(&sql), values)
    }

    /// Execute the query and decode all rows.
    pub async fn fetch(&self) -> Result<Vec<P::Output>> {
        let (sql, values) = self.to_sql();
        debug!(sql = %sql, params = values.len(), "Executing select query");

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = value.bind_to_query(query);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let plan = self.fetch_plan();
        let decoded = rows
            .iter()
            .map(|row| {
                let mut index = 0;
                self.projection.decode(row, &mut index, &plan)
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(decoded)
    }

    /// `None` for no rows, an error for more than one. At most two rows are
    /// read, so the error reports a lower bound.
    pub async fn fetch_one(&self) -> Result<Option<P::Output>> {
        let probe = match self.limit {
            Some(limit) if (0..=2).contains(&limit) => self.clone(),
            _ => self.clone().limit(2),
        };
        let mut rows = probe.fetch().await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            at_least => Err(QueryError::NonUniqueResult { at_least }),
        }
    }

    /// First row, if any (`LIMIT 1`).
    pub async fn fetch_first(&self) -> Result<Option<P::Output>> {
        let rows = self.clone().limit(1).fetch().await?;
        Ok(rows.into_iter().next())
    }

    /// Count the rows the query matches, ignoring ordering, offset and limit.
    pub async fn fetch_count(&self) -> Result<i64> {
        let (sql, values) = self.to_count_sql();
        debug!(sql = %sql, params = values.len(), "Executing count query");

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = value.bind_to_query(query);
        }
        let row = query.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count)
    }
}

fn push_conditions(
    sql: &mut String,
    values: &mut Vec<SqlValue>,
    keyword: &str,
    conditions: &[Predicate],
) {
    if conditions.is_empty() {
        return;
    }
    let parts: Vec<&str> = conditions.iter().map(|c| c.sql()).collect();
    sql.push_str(keyword);
    sql.push_str(&parts.join(" AND "));
    for condition in conditions {
        values.extend_from_slice(condition.values());
    }
}

/// Rewrite each bare `?` placeholder to `?N` in order of appearance.
fn number_params(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len() + 8);
    let mut counter = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        result.push(c);
        if c == '?' && !chars.peek().is_some_and(|next| next.is_ascii_digit()) {
            counter += 1;
            result.push_str(&counter.to_string());
        }
    }
    result
}
