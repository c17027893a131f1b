//! Typed column paths, predicates, orderings and aggregates
//!
//! Every builder here renders a SQL fragment with `?` placeholders and
//! carries the values to bind, in placeholder order. Numbering happens once
//! the whole statement is assembled (see `builder`).

use std::fmt;
use std::marker::PhantomData;

use super::traits::{NullHandling, Numeric, OrderDirection, SqlType, SqlValue};

/// Anything that renders to a SQL scalar expression.
pub trait Expression {
    fn to_sql(&self) -> String;
}

/// Untyped `alias.column` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub alias: &'static str,
    pub name: &'static str,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.name)
    }
}

impl Expression for ColumnRef {
    fn to_sql(&self) -> String {
        self.to_string()
    }
}

/// A column of an aliased entity, typed by what it decodes into.
pub struct Column<T> {
    alias: &'static str,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Column<T> {}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Column({}.{})", self.alias, self.name)
    }
}

impl<T> Expression for Column<T> {
    fn to_sql(&self) -> String {
        format!("{}.{}", self.alias, self.name)
    }
}

impl<T> Column<T> {
    pub const fn new(alias: &'static str, name: &'static str) -> Self {
        Self {
            alias,
            name,
            _marker: PhantomData,
        }
    }

    pub fn alias(&self) -> &'static str {
        self.alias
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef {
            alias: self.alias,
            name: self.name,
        }
    }

    pub fn asc(&self) -> OrderSpecifier {
        OrderSpecifier::new(self.to_sql(), OrderDirection::Asc)
    }

    pub fn desc(&self) -> OrderSpecifier {
        OrderSpecifier::new(self.to_sql(), OrderDirection::Desc)
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::raw(format!("{} IS NULL", self.to_sql()))
    }

    pub fn is_not_null(&self) -> Predicate {
        Predicate::raw(format!("{} IS NOT NULL", self.to_sql()))
    }
}

impl<T: SqlType> Column<T> {
    /// The same column read as possibly NULL (the far side of a left join).
    pub fn nullable(&self) -> Column<T::Nullable> {
        Column::new(self.alias, self.name)
    }

    pub fn eq(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, "=", param::<T>(value))
    }

    pub fn ne(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, "<>", param::<T>(value))
    }

    pub fn lt(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, "<", param::<T>(value))
    }

    /// Less than or equal.
    pub fn loe(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, "<=", param::<T>(value))
    }

    pub fn gt(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, ">", param::<T>(value))
    }

    /// Greater than or equal.
    pub fn goe(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, ">=", param::<T>(value))
    }

    /// Inclusive on both ends.
    pub fn between(&self, low: impl Into<T::Param>, high: impl Into<T::Param>) -> Predicate {
        Predicate {
            sql: format!("{} BETWEEN ? AND ?", self.to_sql()),
            values: vec![param::<T>(low), param::<T>(high)],
        }
    }

    /// An empty list matches nothing.
    pub fn in_list<I, V>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<T::Param>,
    {
        let values: Vec<SqlValue> = values.into_iter().map(param::<T>).collect();
        if values.is_empty() {
            return Predicate::raw("1 = 0");
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        Predicate {
            sql: format!("{} IN ({})", self.to_sql(), placeholders),
            values,
        }
    }

    /// Column-to-column equality, the condition of a theta join.
    pub fn eq_column<U>(&self, other: &Column<U>) -> Predicate
    where
        U: SqlType<Param = T::Param>,
    {
        Predicate::raw(format!("{} = {}", self.to_sql(), other.to_sql()))
    }

    pub fn count(&self) -> Aggregate<i64> {
        Aggregate::new(format!("COUNT({})", self.to_sql()))
    }

    pub fn count_distinct(&self) -> Aggregate<i64> {
        Aggregate::new(format!("COUNT(DISTINCT {})", self.to_sql()))
    }

    pub fn min(&self) -> Aggregate<T::Nullable> {
        Aggregate::new(format!("MIN({})", self.to_sql()))
    }

    pub fn max(&self) -> Aggregate<T::Nullable> {
        Aggregate::new(format!("MAX({})", self.to_sql()))
    }
}

impl<T: Numeric> Column<T> {
    /// NULL when no rows are aggregated.
    pub fn sum(&self) -> Aggregate<Option<T::Sum>>
    where
        T::Sum: SqlType<Nullable = Option<T::Sum>>,
    {
        Aggregate::new(format!("SUM({})", self.to_sql()))
    }

    pub fn avg(&self) -> Aggregate<Option<f64>> {
        Aggregate::new(format!("AVG({})", self.to_sql()))
    }
}

impl<T: SqlType<Param = String>> Column<T> {
    /// SQL LIKE with the pattern as given.
    pub fn like(&self, pattern: impl Into<String>) -> Predicate {
        let pattern: String = pattern.into();
        compare(self, "LIKE", pattern)
    }

    pub fn contains(&self, needle: &str) -> Predicate {
        self.like(format!("%{}%", escape_like(needle))).escaped()
    }

    pub fn starts_with(&self, prefix: &str) -> Predicate {
        self.like(format!("{}%", escape_like(prefix))).escaped()
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn param<T: SqlType>(value: impl Into<T::Param>) -> SqlValue {
    let value: T::Param = value.into();
    value.into()
}

fn compare(lhs: &impl Expression, op: &str, value: impl Into<SqlValue>) -> Predicate {
    Predicate {
        sql: format!("{} {} ?", lhs.to_sql(), op),
        values: vec![value.into()],
    }
}

/// An aggregate expression (COUNT, SUM, AVG, MIN, MAX) typed by its result.
pub struct Aggregate<T> {
    sql: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Aggregate<T> {
    fn clone(&self) -> Self {
        Self::new(self.sql.clone())
    }
}

impl<T> fmt::Debug for Aggregate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aggregate({})", self.sql)
    }
}

impl<T> Expression for Aggregate<T> {
    fn to_sql(&self) -> String {
        self.sql.clone()
    }
}

impl<T> Aggregate<T> {
    pub(crate) fn new(sql: String) -> Self {
        Self {
            sql,
            _marker: PhantomData,
        }
    }

    pub fn asc(&self) -> OrderSpecifier {
        OrderSpecifier::new(self.sql.clone(), OrderDirection::Asc)
    }

    pub fn desc(&self) -> OrderSpecifier {
        OrderSpecifier::new(self.sql.clone(), OrderDirection::Desc)
    }
}

impl<T: SqlType> Aggregate<T> {
    pub fn eq(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, "=", param::<T>(value))
    }

    pub fn gt(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, ">", param::<T>(value))
    }

    pub fn goe(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, ">=", param::<T>(value))
    }

    pub fn lt(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, "<", param::<T>(value))
    }

    pub fn loe(&self, value: impl Into<T::Param>) -> Predicate {
        compare(self, "<=", param::<T>(value))
    }
}

/// A boolean condition with its bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    sql: String,
    values: Vec<SqlValue>,
}

impl Predicate {
    /// A condition with no parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    /// A condition with `?` placeholders and their values, in order.
    pub fn with_values(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub(crate) fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.values)
    }

    /// `None` leaves the predicate unchanged.
    pub fn and(self, other: impl Into<Option<Predicate>>) -> Predicate {
        match other.into() {
            Some(other) => self.join("AND", other),
            None => self,
        }
    }

    /// `None` leaves the predicate unchanged.
    pub fn or(self, other: impl Into<Option<Predicate>>) -> Predicate {
        match other.into() {
            Some(other) => self.join("OR", other),
            None => self,
        }
    }

    pub fn not(self) -> Predicate {
        Predicate {
            sql: format!("NOT ({})", self.sql),
            values: self.values,
        }
    }

    /// AND of every present predicate; `None` when all are absent.
    pub fn all<I>(predicates: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Option<Predicate>>,
    {
        predicates
            .into_iter()
            .flatten()
            .reduce(|acc, next| acc.and(next))
    }

    fn join(mut self, op: &str, other: Predicate) -> Predicate {
        self.sql = format!("({} {} {})", self.sql, op, other.sql);
        self.values.extend(other.values);
        self
    }

    fn escaped(mut self) -> Predicate {
        self.sql.push_str(" ESCAPE '\\'");
        self
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpecifier {
    expr: String,
    direction: OrderDirection,
    nulls: NullHandling,
}

impl OrderSpecifier {
    pub fn new(expr: String, direction: OrderDirection) -> Self {
        Self {
            expr,
            direction,
            nulls: NullHandling::Native,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullHandling::NullsFirst;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullHandling::NullsLast;
        self
    }

    pub fn with_null_handling(mut self, nulls: NullHandling) -> Self {
        self.nulls = nulls;
        self
    }

    pub fn to_sql(&self) -> String {
        match self.nulls.to_sql() {
            Some(nulls) => format!("{} {} {}", self.expr, self.direction.to_sql(), nulls),
            None => format!("{} {}", self.expr, self.direction.to_sql()),
        }
    }
}

/// A many-to-one association from one entity path to another, keyed by a
/// foreign key column on the owning side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManyToOne {
    /// Alias of the owning entity
    pub source_alias: &'static str,
    /// Association name (e.g. "team")
    pub name: &'static str,
    /// Foreign key column on the owning table
    pub foreign_key: &'static str,
    /// Primary key column on the target table
    pub target_key: &'static str,
}

impl ManyToOne {
    pub const fn new(
        source_alias: &'static str,
        name: &'static str,
        foreign_key: &'static str,
        target_key: &'static str,
    ) -> Self {
        Self {
            source_alias,
            name,
            foreign_key,
            target_key,
        }
    }

    /// Join condition against the target alias.
    pub fn join_condition(&self, target_alias: &str) -> String {
        format!(
            "{}.{} = {}.{}",
            self.source_alias, self.foreign_key, target_alias, self.target_key
        )
    }
}
