//! Normalizes raw feed records into [`Article`] values.
//!
//! Raw records arrive as loosely-typed JSON maps and are converted here at
//! the boundary; nothing downstream touches untyped maps.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::{FeedConfig, ScoringConfig};
use crate::models::Article;

/// Candidate identifier fields, in priority order. First present wins.
const ID_FIELDS: [&str; 3] = ["id", "contentId", "articleId"];

/// Author name used when a record carries neither a display name nor an alias.
const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("record has no usable identifier (title: {title:?})")]
    MissingIdentifier { title: String },
}

/// Resolve a record's identity via the fixed fallback chain.
///
/// Shared with the fetch loop so pagination dedup and extraction agree on
/// what identifies a record. Empty strings count as absent.
pub fn record_identity(raw: &Value) -> Option<&str> {
    ID_FIELDS.iter().find_map(|field| {
        raw.get(*field)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    })
}

/// Extract one article from a raw feed record.
///
/// Total over well-formed input: every field except the identifier has a
/// default when absent.
pub fn parse_article(
    raw: &Value,
    feed: &FeedConfig,
    scoring: &ScoringConfig,
) -> Result<Article, ParseError> {
    let content_id = record_identity(raw)
        .ok_or_else(|| ParseError::MissingIdentifier {
            title: title_of(raw).to_string(),
        })?
        .to_string();

    let author = raw.get("author");
    let author_alias = author
        .and_then(|a| a.get("alias"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let author_name = author
        .and_then(|a| a.get("preferredName"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| author_alias.clone())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let likes_count = raw.get("likesCount").and_then(Value::as_i64).unwrap_or(0) as i32;
    let comments_count = raw
        .get("commentsCount")
        .and_then(Value::as_i64)
        .unwrap_or(0) as i32;

    let engagement_score = f64::from(likes_count) * scoring.like_weight
        + f64::from(comments_count) * scoring.comment_weight;

    // Feed timestamps are milliseconds since epoch.
    let published_at = raw
        .get("lastPublishedAt")
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis);

    let article_url = Some(format!("{}{}", feed.article_base_url, content_id));

    let description = raw
        .get("contentTypeSpecificResponse")
        .and_then(|r| r.get("article"))
        .and_then(|a| a.get("description"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let now = Utc::now();
    Ok(Article {
        content_id,
        title: title_of(raw).to_string(),
        author_name,
        author_alias,
        likes_count,
        comments_count,
        engagement_score,
        published_at,
        article_url,
        description,
        first_seen: now,
        last_updated: now,
    })
}

fn title_of(raw: &Value) -> &str {
    raw.get("title").and_then(Value::as_str).unwrap_or("Untitled")
}

/// Extract a whole batch, logging and skipping records that fail.
pub fn parse_articles(raws: &[Value], feed: &FeedConfig, scoring: &ScoringConfig) -> Vec<Article> {
    let mut parsed = Vec::with_capacity(raws.len());
    for raw in raws {
        match parse_article(raw, feed, scoring) {
            Ok(article) => parsed.push(article),
            Err(e) => warn!("skipping record: {}", e),
        }
    }
    parsed
}
