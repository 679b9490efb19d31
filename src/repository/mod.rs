//! Repository layer for SQLite persistence.
//!
//! All database access goes through Diesel with diesel-async's
//! SyncConnectionWrapper, so call sites stay async while queries keep
//! compile-time checking.

pub mod article;
pub mod migrations;
pub mod models;
pub mod pool;

pub use article::{ArticleRepository, SortField, StoreStats, UpsertOutcome};
pub use pool::{AsyncSqlitePool, DieselError};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to the Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
