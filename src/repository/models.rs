//! Diesel record types for database rows.
//!
//! Timestamps are stored as RFC 3339 text; conversion to domain models
//! happens in the `From` impls here.

use diesel::prelude::*;

use crate::models::{Article, EngagementSnapshot};
use crate::schema::{articles, engagement_history};

use super::{parse_datetime, parse_datetime_opt};

/// Article row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = articles)]
#[diesel(primary_key(content_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArticleRecord {
    pub content_id: String,
    pub title: String,
    pub author_name: String,
    pub author_alias: Option<String>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub engagement_score: f64,
    pub published_at: Option<String>,
    pub article_url: Option<String>,
    pub description: String,
    pub first_seen: String,
    pub last_updated: String,
}

/// New article row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = articles)]
pub struct NewArticle<'a> {
    pub content_id: &'a str,
    pub title: &'a str,
    pub author_name: &'a str,
    pub author_alias: Option<&'a str>,
    pub likes_count: i32,
    pub comments_count: i32,
    pub engagement_score: f64,
    pub published_at: Option<&'a str>,
    pub article_url: Option<&'a str>,
    pub description: &'a str,
    pub first_seen: &'a str,
    pub last_updated: &'a str,
}

/// Engagement history row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = engagement_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotRecord {
    pub id: i32,
    pub content_id: String,
    pub likes_count: i32,
    pub comments_count: i32,
    pub engagement_score: f64,
    pub snapshot_at: String,
}

/// New history row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = engagement_history)]
pub struct NewSnapshot<'a> {
    pub content_id: &'a str,
    pub likes_count: i32,
    pub comments_count: i32,
    pub engagement_score: f64,
    pub snapshot_at: &'a str,
}

impl From<ArticleRecord> for Article {
    fn from(record: ArticleRecord) -> Self {
        Article {
            content_id: record.content_id,
            title: record.title,
            author_name: record.author_name,
            author_alias: record.author_alias,
            likes_count: record.likes_count,
            comments_count: record.comments_count,
            engagement_score: record.engagement_score,
            published_at: parse_datetime_opt(record.published_at),
            article_url: record.article_url,
            description: record.description,
            first_seen: parse_datetime(&record.first_seen),
            last_updated: parse_datetime(&record.last_updated),
        }
    }
}

impl From<SnapshotRecord> for EngagementSnapshot {
    fn from(record: SnapshotRecord) -> Self {
        EngagementSnapshot {
            id: record.id,
            content_id: record.content_id,
            likes_count: record.likes_count,
            comments_count: record.comments_count,
            engagement_score: record.engagement_score,
            snapshot_at: parse_datetime(&record.snapshot_at),
        }
    }
}
