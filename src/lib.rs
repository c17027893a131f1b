//! Typed query building over SQLite for a member/team roster

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod orm;

pub use error::{QueryError, Result};
