//! Projections: what a query selects and how each row is decoded
//!
//! Columns are read positionally. Each projection appends its select-list
//! expressions and later consumes exactly that many columns from the row,
//! so projections nest (tuples of entities and aggregates) without names.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::expr::{Aggregate, Column, ColumnRef, Expression, OrderSpecifier};
use super::pagination::Order;
use super::traits::{DatabaseEntity, SqlType};
use crate::error::{QueryError, Result};

/// Associations that a query materialises through fetch joins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPlan {
    entries: Vec<FetchEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchEntry {
    source_alias: &'static str,
    association: &'static str,
    target_alias: &'static str,
}

impl FetchPlan {
    pub fn add(
        &mut self,
        source_alias: &'static str,
        association: &'static str,
        target_alias: &'static str,
    ) {
        self.entries.push(FetchEntry {
            source_alias,
            association,
            target_alias,
        });
    }

    /// Alias the association was fetched under, if it was.
    pub fn target(&self, source_alias: &str, association: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.source_alias == source_alias && e.association == association)
            .map(|e| e.target_alias)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Something that can appear in a select list.
pub trait Projection: Clone + Send + Sync {
    type Output: Send + Unpin;

    /// Append select-list expressions.
    fn push_columns(&self, plan: &FetchPlan, out: &mut Vec<String>);

    /// Decode starting at `*index`, advancing it past the consumed columns.
    fn decode(
        &self,
        row: &SqliteRow,
        index: &mut usize,
        plan: &FetchPlan,
    ) -> Result<Self::Output, sqlx::Error>;

    fn column_count(&self, plan: &FetchPlan) -> usize {
        let mut columns = Vec::new();
        self.push_columns(plan, &mut columns);
        columns.len()
    }
}

/// Read one column at `*index` and advance.
pub fn read<T: SqlType>(row: &SqliteRow, index: &mut usize) -> Result<T, sqlx::Error> {
    let value = row.try_get::<T, usize>(*index)?;
    *index += 1;
    Ok(value)
}

impl<T: SqlType> Projection for Column<T> {
    type Output = T;

    fn push_columns(&self, _plan: &FetchPlan, out: &mut Vec<String>) {
        out.push(self.to_sql());
    }

    fn decode(
        &self,
        row: &SqliteRow,
        index: &mut usize,
        _plan: &FetchPlan,
    ) -> Result<T, sqlx::Error> {
        read(row, index)
    }
}

impl<T: SqlType> Projection for Aggregate<T> {
    type Output = T;

    fn push_columns(&self, _plan: &FetchPlan, out: &mut Vec<String>) {
        out.push(self.to_sql());
    }

    fn decode(
        &self,
        row: &SqliteRow,
        index: &mut usize,
        _plan: &FetchPlan,
    ) -> Result<T, sqlx::Error> {
        read(row, index)
    }
}

macro_rules! tuple_projection {
    ($($name:ident),+) => {
        impl<$($name: Projection),+> Projection for ($($name,)+) {
            type Output = ($($name::Output,)+);

            #[allow(non_snake_case)]
            fn push_columns(&self, plan: &FetchPlan, out: &mut Vec<String>) {
                let ($($name,)+) = self;
                $($name.push_columns(plan, out);)+
            }

            #[allow(non_snake_case)]
            fn decode(
                &self,
                row: &SqliteRow,
                index: &mut usize,
                plan: &FetchPlan,
            ) -> Result<Self::Output, sqlx::Error> {
                let ($($name,)+) = self;
                Ok(($($name.decode(row, index, plan)?,)+))
            }
        }
    };
}

tuple_projection!(A, B);
tuple_projection!(A, B, C);
tuple_projection!(A, B, C, D);
tuple_projection!(A, B, C, D, E);

/// A typed handle on an aliased entity table.
///
/// Selecting the path itself decodes the whole entity.
pub trait EntityPath: Projection + Copy + 'static {
    type Entity: DatabaseEntity;

    fn alias(&self) -> &'static str;

    /// Column a sort property name maps to.
    fn property(&self, name: &str) -> Option<ColumnRef>;

    fn table(&self) -> &'static str {
        <Self::Entity as DatabaseEntity>::TABLE_NAME
    }

    /// COUNT over the primary key.
    fn count(&self) -> Aggregate<i64> {
        Aggregate::new(format!(
            "COUNT({}.{})",
            self.alias(),
            <Self::Entity as DatabaseEntity>::PRIMARY_KEY
        ))
    }

    /// Map a sort order onto this entity's columns.
    fn order_for(&self, order: &Order) -> Result<OrderSpecifier> {
        let column = self
            .property(&order.property)
            .ok_or_else(|| QueryError::UnknownProperty {
                entity: <Self::Entity as DatabaseEntity>::TABLE_NAME,
                property: order.property.clone(),
            })?;
        Ok(OrderSpecifier::new(column.to_sql(), order.direction)
            .with_null_handling(order.null_handling))
    }

    /// Select this entity as `Option`, `None` when the row has no match
    /// (the unmatched side of a left join).
    fn optional(self) -> OptionalEntity<Self> {
        OptionalEntity(self)
    }
}

/// See [`EntityPath::optional`].
#[derive(Debug, Clone, Copy)]
pub struct OptionalEntity<Q>(pub Q);

impl<Q: EntityPath> Projection for OptionalEntity<Q> {
    type Output = Option<Q::Output>;

    fn push_columns(&self, plan: &FetchPlan, out: &mut Vec<String>) {
        self.0.push_columns(plan, out);
    }

    fn decode(
        &self,
        row: &SqliteRow,
        index: &mut usize,
        plan: &FetchPlan,
    ) -> Result<Self::Output, sqlx::Error> {
        // First column of an entity projection is always its primary key
        let key: Option<i64> = row.try_get(*index)?;
        if key.is_none() {
            *index += self.0.column_count(plan);
            return Ok(None);
        }
        self.0.decode(row, index, plan).map(Some)
    }
}
