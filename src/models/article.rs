//! Domain models for tracked articles and their engagement history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article tracked by the service.
///
/// Identified by the feed's stable `content_id`. Mutated in place as new
/// sightings arrive; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub content_id: String,
    pub title: String,
    /// Display name, falling back to the alias, then "Unknown".
    pub author_name: String,
    pub author_alias: Option<String>,
    pub likes_count: i32,
    pub comments_count: i32,
    /// Weighted sum of likes and comments. Always recomputed from the
    /// current counts, never carried forward independently of them.
    pub engagement_score: f64,
    pub published_at: Option<DateTime<Utc>>,
    pub article_url: Option<String>,
    pub description: String,
    /// When this article was first stored.
    pub first_seen: DateTime<Utc>,
    /// Bumped on every store write.
    pub last_updated: DateTime<Utc>,
}

/// Point-in-time engagement metrics for one article, captured immediately
/// before an update overwrote them. Append-only; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    /// Database row ID.
    pub id: i32,
    pub content_id: String,
    pub likes_count: i32,
    pub comments_count: i32,
    pub engagement_score: f64,
    pub snapshot_at: DateTime<Utc>,
}
