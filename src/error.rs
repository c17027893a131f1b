//! Error type for the query layer

use thiserror::Error;

/// Errors raised while building or executing typed queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Anything the driver reports (constraint violations, decode failures, missing rows).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `fetch_one` matched more than one row. Matching stops at the second
    /// row, so `at_least` is a lower bound, not the real match count.
    #[error("query returned at least {at_least} rows where at most one was expected")]
    NonUniqueResult { at_least: usize },

    /// A sort property could not be mapped onto a column of the root entity.
    #[error("entity `{entity}` has no sortable property `{property}`")]
    UnknownProperty {
        entity: &'static str,
        property: String,
    },

    #[error("invalid page request: {0}")]
    InvalidPage(String),
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
