//! Typed query layer
//!
//! Provides typed entity paths and a query builder over SQLite:
//! - Predicates composed from typed columns (`eq`, `between`, `goe`, ...)
//! - Inner, left and theta joins, plus fetch joins into entity relations
//! - Aggregation with grouping
//! - Offset pagination with optional count queries
//!
//! ```rust,ignore
//! use rosterql::db::entities::{MEMBER, TEAM};
//!
//! let members = factory
//!     .select_from(MEMBER)
//!     .join(MEMBER.team, TEAM)
//!     .filter(TEAM.name.eq("teamA"))
//!     .fetch()
//!     .await?;
//! ```

mod builder;
mod expr;
pub mod pagination;
mod projection;
mod repository;
mod traits;

pub use builder::*;
pub use expr::*;
pub use pagination::{Order, Page, PageRequest, Sort, resolve_total, short_circuit_total};
pub use projection::*;
pub use repository::*;
pub use traits::*;
