//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => anyhow::bail!("Unknown LOG_FORMAT: {}", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL, e.g. `sqlite::memory:` or `sqlite://./data/roster.db`
    pub database_url: String,

    /// Pool size for file-backed databases (in-memory always uses one)
    pub max_connections: u32,

    /// Page size used when a caller does not pick one
    pub default_page_size: i64,

    /// Upper bound applied to every requested page size
    pub max_page_size: i64,

    pub log_format: LogFormat,

    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Insert the two-team sample roster into an empty database
    pub seed_sample_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 5,
            default_page_size: 20,
            max_page_size: 2000,
            log_format: LogFormat::Pretty,
            log_filter: "rosterql=info,sqlx=warn".to_string(),
            seed_sample_data: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let max_page_size: i64 = match env::var("MAX_PAGE_SIZE") {
            Ok(v) => v.parse().context("Invalid MAX_PAGE_SIZE")?,
            Err(_) => defaults.max_page_size,
        };
        if max_page_size < 1 {
            anyhow::bail!("MAX_PAGE_SIZE must be at least 1");
        }

        let default_page_size: i64 = match env::var("DEFAULT_PAGE_SIZE") {
            Ok(v) => v.parse().context("Invalid DEFAULT_PAGE_SIZE")?,
            Err(_) => defaults.default_page_size,
        };
        if default_page_size < 1 {
            anyhow::bail!("DEFAULT_PAGE_SIZE must be at least 1");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),

            max_connections: match env::var("DATABASE_MAX_CONNECTIONS") {
                Ok(v) => v.parse().context("Invalid DATABASE_MAX_CONNECTIONS")?,
                Err(_) => defaults.max_connections,
            },

            default_page_size: default_page_size.min(max_page_size),
            max_page_size,

            log_format: match env::var("LOG_FORMAT") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.log_format,
            },

            log_filter: defaults.log_filter,

            seed_sample_data: match env::var("SEED_SAMPLE_DATA") {
                Ok(v) => parse_flag(&v).context("Invalid SEED_SAMPLE_DATA")?,
                Err(_) => defaults.seed_sample_data,
            },
        })
    }
}

/// Boolean environment value, case-insensitive.
fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {:?}", other),
    }
}
