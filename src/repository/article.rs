//! Article repository: upsert-with-snapshot writes and ranked reads.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::models::{Article, EngagementSnapshot};
use crate::schema::{articles, engagement_history};

use super::models::{ArticleRecord, NewArticle, NewSnapshot, SnapshotRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::parse_datetime;

/// Leaderboard sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    EngagementScore,
    LikesCount,
    CommentsCount,
}

impl SortField {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "engagement_score" => Some(Self::EngagementScore),
            "likes_count" => Some(Self::LikesCount),
            "comments_count" => Some(Self::CommentsCount),
            _ => None,
        }
    }

    #[allow(dead_code)]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EngagementScore => "engagement_score",
            Self::LikesCount => "likes_count",
            Self::CommentsCount => "comments_count",
        }
    }
}

/// Store-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_articles: i64,
    pub total_likes: i64,
    pub total_comments: i64,
}

/// What an upsert did.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub article: Article,
    /// True when this was the first sighting of the content id.
    pub created: bool,
    /// True when changed metrics forced a history snapshot.
    pub snapshotted: bool,
}

/// SQLite-backed article store.
#[derive(Clone)]
pub struct ArticleRepository {
    pool: AsyncSqlitePool,
}

impl ArticleRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update an article by `content_id`.
    ///
    /// When the stored likes or comments differ from the incoming values,
    /// the stored (pre-update) metrics are written to `engagement_history`
    /// in the same transaction as the overwrite, so no reader can observe
    /// an updated row without its due snapshot. `last_updated` bumps on
    /// every write; `first_seen` is preserved for existing rows.
    pub async fn upsert(&self, incoming: &Article) -> Result<UpsertOutcome, DieselError> {
        let mut conn = self.pool.get().await?;

        let record = incoming.clone();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.transaction(|conn| {
            Box::pin(async move {
                let existing: Option<ArticleRecord> = articles::table
                    .find(record.content_id.as_str())
                    .first(conn)
                    .await
                    .optional()?;

                let published_at = record.published_at.map(|dt| dt.to_rfc3339());

                match existing {
                    Some(prev) => {
                        let metrics_changed = prev.likes_count != record.likes_count
                            || prev.comments_count != record.comments_count;

                        if metrics_changed {
                            diesel::insert_into(engagement_history::table)
                                .values(NewSnapshot {
                                    content_id: &prev.content_id,
                                    likes_count: prev.likes_count,
                                    comments_count: prev.comments_count,
                                    engagement_score: prev.engagement_score,
                                    snapshot_at: &now_str,
                                })
                                .execute(conn)
                                .await?;
                        }

                        diesel::update(articles::table.find(record.content_id.as_str()))
                            .set((
                                articles::title.eq(&record.title),
                                articles::author_name.eq(&record.author_name),
                                articles::author_alias.eq(record.author_alias.as_deref()),
                                articles::likes_count.eq(record.likes_count),
                                articles::comments_count.eq(record.comments_count),
                                articles::engagement_score.eq(record.engagement_score),
                                articles::published_at.eq(published_at.as_deref()),
                                articles::article_url.eq(record.article_url.as_deref()),
                                articles::description.eq(&record.description),
                                articles::last_updated.eq(&now_str),
                            ))
                            .execute(conn)
                            .await?;

                        let mut article = record;
                        article.first_seen = parse_datetime(&prev.first_seen);
                        article.last_updated = now;
                        Ok(UpsertOutcome {
                            article,
                            created: false,
                            snapshotted: metrics_changed,
                        })
                    }
                    None => {
                        diesel::insert_into(articles::table)
                            .values(NewArticle {
                                content_id: &record.content_id,
                                title: &record.title,
                                author_name: &record.author_name,
                                author_alias: record.author_alias.as_deref(),
                                likes_count: record.likes_count,
                                comments_count: record.comments_count,
                                engagement_score: record.engagement_score,
                                published_at: published_at.as_deref(),
                                article_url: record.article_url.as_deref(),
                                description: &record.description,
                                first_seen: &now_str,
                                last_updated: &now_str,
                            })
                            .execute(conn)
                            .await?;

                        let mut article = record;
                        article.first_seen = now;
                        article.last_updated = now;
                        Ok(UpsertOutcome {
                            article,
                            created: true,
                            snapshotted: false,
                        })
                    }
                }
            })
        })
        .await
    }

    /// Get a single article by content id.
    pub async fn get(&self, content_id: &str) -> Result<Option<Article>, DieselError> {
        let mut conn = self.pool.get().await?;

        articles::table
            .find(content_id)
            .first::<ArticleRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Article::from))
    }

    /// Engagement history for an article, newest first.
    pub async fn history(
        &self,
        content_id: &str,
        limit: i64,
    ) -> Result<Vec<EngagementSnapshot>, DieselError> {
        let mut conn = self.pool.get().await?;

        engagement_history::table
            .filter(engagement_history::content_id.eq(content_id))
            .order((
                engagement_history::snapshot_at.desc(),
                engagement_history::id.desc(),
            ))
            .limit(limit)
            .load::<SnapshotRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(EngagementSnapshot::from).collect())
    }

    /// Case-insensitive title search, best engagement first.
    ///
    /// SQLite LIKE is case-insensitive for ASCII.
    pub async fn search_title(&self, query: &str) -> Result<Vec<Article>, DieselError> {
        let mut conn = self.pool.get().await?;

        let pattern = format!("%{}%", query);
        articles::table
            .filter(articles::title.like(pattern))
            .order(articles::engagement_score.desc())
            .load::<ArticleRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Article::from).collect())
    }

    /// Ranked articles, descending by the sort field.
    ///
    /// Ties keep the store's natural order. At most one author can be
    /// excluded (e.g. the event host).
    pub async fn leaderboard(
        &self,
        limit: i64,
        sort: SortField,
        exclude_author: Option<&str>,
    ) -> Result<Vec<Article>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = articles::table.into_boxed();
        if let Some(author) = exclude_author {
            query = query.filter(articles::author_name.ne(author));
        }
        query = match sort {
            SortField::EngagementScore => query.order(articles::engagement_score.desc()),
            SortField::LikesCount => query.order(articles::likes_count.desc()),
            SortField::CommentsCount => query.order(articles::comments_count.desc()),
        };

        query
            .limit(limit)
            .load::<ArticleRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Article::from).collect())
    }

    /// Store-wide totals, computed fresh on every call.
    pub async fn stats(&self) -> Result<StoreStats, DieselError> {
        use diesel::dsl::{count_star, sum};

        let mut conn = self.pool.get().await?;

        let total_articles: i64 = articles::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        let total_likes: Option<i64> = articles::table
            .select(sum(articles::likes_count))
            .first(&mut conn)
            .await?;
        let total_comments: Option<i64> = articles::table
            .select(sum(articles::comments_count))
            .first(&mut conn)
            .await?;

        Ok(StoreStats {
            total_articles,
            total_likes: total_likes.unwrap_or(0),
            total_comments: total_comments.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::migrations::run_migrations;
    use tempfile::{tempdir, TempDir};

    fn sample(content_id: &str, likes: i32, comments: i32) -> Article {
        let now = Utc::now();
        Article {
            content_id: content_id.to_string(),
            title: format!("Article {}", content_id),
            author_name: "Jordan Walsh".to_string(),
            author_alias: Some("jwalsh".to_string()),
            likes_count: likes,
            comments_count: comments,
            engagement_score: f64::from(likes + comments),
            published_at: None,
            article_url: Some(format!("https://builder.example.com{}", content_id)),
            description: String::new(),
            first_seen: now,
            last_updated: now,
        }
    }

    async fn setup() -> (ArticleRepository, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        run_migrations(&db_path.display().to_string())
            .await
            .unwrap();
        let repo = ArticleRepository::new(AsyncSqlitePool::from_path(&db_path));
        (repo, dir)
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let (repo, _dir) = setup().await;

        let outcome = repo.upsert(&sample("/content/a1", 3, 1)).await.unwrap();
        assert!(outcome.created);
        assert!(!outcome.snapshotted);

        let stored = repo.get("/content/a1").await.unwrap().unwrap();
        assert_eq!(stored.likes_count, 3);
        assert_eq!(stored.comments_count, 1);
        assert_eq!(stored.author_name, "Jordan Walsh");
    }

    #[tokio::test]
    async fn unchanged_metrics_produce_no_snapshot() {
        let (repo, _dir) = setup().await;

        repo.upsert(&sample("/content/a1", 3, 1)).await.unwrap();
        let outcome = repo.upsert(&sample("/content/a1", 3, 1)).await.unwrap();

        assert!(!outcome.created);
        assert!(!outcome.snapshotted);
        assert!(repo.history("/content/a1", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_captures_pre_update_values() {
        let (repo, _dir) = setup().await;

        repo.upsert(&sample("/content/a1", 1, 0)).await.unwrap();
        repo.upsert(&sample("/content/a1", 5, 2)).await.unwrap();
        let outcome = repo.upsert(&sample("/content/a1", 9, 4)).await.unwrap();
        assert!(outcome.snapshotted);

        let history = repo.history("/content/a1", 50).await.unwrap();
        assert_eq!(history.len(), 2);
        // Newest first: the latest snapshot holds the state the third
        // upsert overwrote, the oldest holds the original insert's state.
        assert_eq!(history[0].likes_count, 5);
        assert_eq!(history[0].comments_count, 2);
        assert_eq!(history[1].likes_count, 1);
        assert_eq!(history[1].comments_count, 0);
    }

    #[tokio::test]
    async fn n_updates_yield_n_minus_one_snapshots() {
        let (repo, _dir) = setup().await;

        for likes in [2, 4, 6, 8] {
            repo.upsert(&sample("/content/a1", likes, 0)).await.unwrap();
        }

        let history = repo.history("/content/a1", 50).await.unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn metadata_change_updates_row_without_snapshot() {
        let (repo, _dir) = setup().await;

        repo.upsert(&sample("/content/a1", 3, 1)).await.unwrap();

        let mut renamed = sample("/content/a1", 3, 1);
        renamed.title = "Updated title".to_string();
        let outcome = repo.upsert(&renamed).await.unwrap();

        assert!(!outcome.snapshotted);
        let stored = repo.get("/content/a1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Updated title");
        assert!(repo.history("/content/a1", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_seen_survives_updates() {
        let (repo, _dir) = setup().await;

        let created = repo.upsert(&sample("/content/a1", 1, 0)).await.unwrap();
        let updated = repo.upsert(&sample("/content/a1", 2, 0)).await.unwrap();

        assert_eq!(created.article.first_seen, updated.article.first_seen);
        assert!(updated.article.last_updated >= created.article.last_updated);
    }

    #[tokio::test]
    async fn leaderboard_sorts_and_excludes_author() {
        let (repo, _dir) = setup().await;

        let mut a = sample("/content/a", 10, 0);
        a.engagement_score = 10.0;
        let mut b = sample("/content/b", 25, 0);
        b.engagement_score = 25.0;
        let mut c = sample("/content/c", 100, 0);
        c.engagement_score = 100.0;
        c.author_name = "Event Host".to_string();

        for article in [&a, &b, &c] {
            repo.upsert(article).await.unwrap();
        }

        let ranked = repo
            .leaderboard(100, SortField::EngagementScore, Some("Event Host"))
            .await
            .unwrap();
        let ids: Vec<_> = ranked.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, ["/content/b", "/content/a"]);

        let unfiltered = repo
            .leaderboard(100, SortField::EngagementScore, None)
            .await
            .unwrap();
        assert_eq!(unfiltered.len(), 3);
        assert_eq!(unfiltered[0].content_id, "/content/c");
    }

    #[tokio::test]
    async fn leaderboard_sorts_by_requested_metric() {
        let (repo, _dir) = setup().await;

        repo.upsert(&sample("/content/a", 1, 9)).await.unwrap();
        repo.upsert(&sample("/content/b", 5, 2)).await.unwrap();

        let by_likes = repo
            .leaderboard(10, SortField::LikesCount, None)
            .await
            .unwrap();
        assert_eq!(by_likes[0].content_id, "/content/b");

        let by_comments = repo
            .leaderboard(10, SortField::CommentsCount, None)
            .await
            .unwrap();
        assert_eq!(by_comments[0].content_id, "/content/a");
    }

    #[tokio::test]
    async fn leaderboard_respects_limit() {
        let (repo, _dir) = setup().await;

        for i in 0..5 {
            repo.upsert(&sample(&format!("/content/{}", i), i, 0))
                .await
                .unwrap();
        }

        let top = repo
            .leaderboard(2, SortField::LikesCount, None)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].likes_count, 4);
    }

    #[tokio::test]
    async fn stats_counts_and_sums() {
        let (repo, _dir) = setup().await;

        repo.upsert(&sample("/content/a", 3, 1)).await.unwrap();
        repo.upsert(&sample("/content/b", 7, 4)).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(
            stats,
            StoreStats {
                total_articles: 2,
                total_likes: 10,
                total_comments: 5,
            }
        );
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let (repo, _dir) = setup().await;
        assert_eq!(repo.stats().await.unwrap(), StoreStats::default());
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let (repo, _dir) = setup().await;

        let mut article = sample("/content/a", 1, 0);
        article.title = "Serverless Image Pipeline".to_string();
        repo.upsert(&article).await.unwrap();

        let hits = repo.search_title("IMAGE").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content_id, "/content/a");
        assert!(repo.search_title("postgres").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_respects_limit() {
        let (repo, _dir) = setup().await;

        for likes in 1..=5 {
            repo.upsert(&sample("/content/a1", likes, 0)).await.unwrap();
        }

        let history = repo.history("/content/a1", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        // Most recent snapshots only.
        assert_eq!(history[0].likes_count, 4);
        assert_eq!(history[1].likes_count, 3);
    }
}
