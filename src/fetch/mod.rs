//! Paginated feed retrieval.
//!
//! Walks the feed's cursor pagination, deduplicating records across pages
//! and bounding both retries and runaway cursors. Persistence is left to
//! the caller.

pub mod cookies;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::FeedConfig;
use crate::extract::record_identity;

use cookies::CookieError;

#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP 401 from the feed. Credentials, not transient: never retried.
    #[error("feed authentication expired; re-export session cookies")]
    AuthExpired,

    #[error("page request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Status(StatusCode),

    #[error("page request failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error(transparent)]
    Cookies(#[from] CookieError),
}

/// One page of the feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    #[serde(default, rename = "feedContents")]
    pub feed_contents: Vec<Value>,
    #[serde(default, rename = "nextToken")]
    pub next_token: Option<String>,
}

/// A cursor-paginated record source.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError>;
}

/// Production source: the content feed API over HTTP.
pub struct HttpFeedSource {
    client: Client,
    endpoint: String,
    content_type: String,
    tag_name: String,
}

impl HttpFeedSource {
    /// Build a client with the session cookie jar loaded from `cookie_path`.
    pub fn new(feed: &FeedConfig, cookie_path: &Path) -> Result<Self, FetchError> {
        let jar = cookies::load_cookie_jar(cookie_path)?;
        let client = Client::builder()
            .user_agent(&feed.user_agent)
            .timeout(feed.request_timeout())
            .gzip(true)
            .brotli(true)
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(Self {
            client,
            endpoint: feed.endpoint.clone(),
            content_type: feed.content_type.clone(),
            tag_name: feed.tag_name.clone(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        let mut params = vec![
            ("contentType", self.content_type.as_str()),
            ("tagName", self.tag_name.as_str()),
        ];
        if let Some(token) = cursor {
            params.push(("nextToken", token));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::AuthExpired);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.json().await?)
    }
}

/// Everything one fetch cycle produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Deduplicated raw records in first-seen order.
    pub items: Vec<Value>,
    pub pages_fetched: u32,
    pub duplicates_skipped: u32,
    /// Records dropped because no identifier could be derived.
    pub missing_id: u32,
    /// Set when the cycle ended early on retry exhaustion; `items` holds
    /// whatever was accumulated before that.
    pub failure: Option<String>,
}

/// Drives the paginated fetch loop against a [`FeedSource`].
pub struct FetchLoop<'a, S: FeedSource> {
    source: &'a S,
    request_delay: Duration,
    retry_delay: Duration,
    max_retries: u32,
}

impl<'a, S: FeedSource> FetchLoop<'a, S> {
    pub fn new(source: &'a S, feed: &FeedConfig) -> Self {
        Self {
            source,
            request_delay: feed.request_delay(),
            retry_delay: feed.retry_delay(),
            max_retries: feed.max_retries,
        }
    }

    /// Retrieve the complete result set.
    ///
    /// Stops on: no next cursor, two consecutive pages yielding no new
    /// unique records (cursors that loop or stall), or retry exhaustion.
    /// An expired session is the only hard error; exhaustion returns the
    /// partial result set with the failure recorded.
    pub async fn fetch_all(&self) -> Result<FetchOutcome, FetchError> {
        let mut outcome = FetchOutcome::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut consecutive_empty = 0u32;

        loop {
            let page = match self.fetch_page_with_retry(cursor.as_deref()).await {
                Ok(page) => page,
                Err(FetchError::AuthExpired) => return Err(FetchError::AuthExpired),
                Err(e) => {
                    warn!("fetch cycle ended early: {}", e);
                    outcome.failure = Some(e.to_string());
                    return Ok(outcome);
                }
            };
            outcome.pages_fetched += 1;

            let page_total = page.feed_contents.len();
            let mut new_items = 0u32;
            for item in page.feed_contents {
                match record_identity(&item).map(str::to_string) {
                    Some(id) if seen_ids.contains(&id) => outcome.duplicates_skipped += 1,
                    Some(id) => {
                        seen_ids.insert(id);
                        outcome.items.push(item);
                        new_items += 1;
                    }
                    None => {
                        outcome.missing_id += 1;
                        warn!(
                            "dropping record without identifier (title: {:?})",
                            item.get("title").and_then(serde_json::Value::as_str).unwrap_or("")
                        );
                    }
                }
            }

            if new_items == 0 {
                consecutive_empty += 1;
                info!(
                    "page {}: {} records, none new ({} consecutive empty)",
                    outcome.pages_fetched, page_total, consecutive_empty
                );
                if consecutive_empty >= 2 {
                    info!("stopping: two consecutive pages with no new records");
                    break;
                }
            } else {
                consecutive_empty = 0;
                info!(
                    "page {}: {} new records ({} total)",
                    outcome.pages_fetched,
                    new_items,
                    outcome.items.len()
                );
            }

            match page.next_token {
                Some(token) => {
                    cursor = Some(token);
                    tokio::time::sleep(self.request_delay).await;
                }
                None => {
                    info!("reached last page");
                    break;
                }
            }
        }

        Ok(outcome)
    }

    /// Fetch one page, retrying transient failures a bounded number of
    /// times. An expired session is never retried.
    async fn fetch_page_with_retry(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.source.fetch_page(cursor).await {
                Ok(page) => return Ok(page),
                Err(FetchError::AuthExpired) => return Err(FetchError::AuthExpired),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    warn!(
                        "attempt {} failed ({}), retrying in {:?}",
                        attempt, e, self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of page results, then empty pages.
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<FeedPage, FetchError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<FeedPage, FetchError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn fetch_page(&self, _cursor: Option<&str>) -> Result<FeedPage, FetchError> {
            *self.calls.lock().unwrap() += 1;
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(FeedPage::default()))
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<FeedPage, FetchError> {
        Ok(FeedPage {
            feed_contents: ids.iter().map(|id| json!({"id": *id})).collect(),
            next_token: next.map(str::to_string),
        })
    }

    fn fast_config() -> FeedConfig {
        FeedConfig {
            request_delay_ms: 0,
            retry_delay_ms: 0,
            max_retries: 3,
            ..FeedConfig::default()
        }
    }

    fn item_ids(outcome: &FetchOutcome) -> Vec<&str> {
        outcome
            .items
            .iter()
            .filter_map(record_identity)
            .collect()
    }

    #[tokio::test]
    async fn accumulates_pages_in_first_seen_order() {
        let source = ScriptedSource::new(vec![
            page(&["/c/1", "/c/2"], Some("t1")),
            page(&["/c/3"], None),
        ]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        assert_eq!(item_ids(&outcome), ["/c/1", "/c/2", "/c/3"]);
        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn overlapping_pages_keep_each_id_once() {
        let source = ScriptedSource::new(vec![
            page(&["/c/1", "/c/2"], Some("t1")),
            page(&["/c/2", "/c/3"], Some("t2")),
            page(&["/c/3", "/c/1", "/c/4"], None),
        ]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        assert_eq!(item_ids(&outcome), ["/c/1", "/c/2", "/c/3", "/c/4"]);
        assert_eq!(outcome.duplicates_skipped, 3);
    }

    #[tokio::test]
    async fn stops_after_two_pages_without_new_records() {
        // Cursor keeps advancing but every page repeats the same records.
        let source = ScriptedSource::new(vec![
            page(&["/c/1"], Some("t1")),
            page(&["/c/1"], Some("t2")),
            page(&["/c/1"], Some("t3")),
            page(&["/c/1"], Some("t4")),
        ]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        assert_eq!(item_ids(&outcome), ["/c/1"]);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn one_empty_page_between_full_ones_resets_the_counter() {
        let source = ScriptedSource::new(vec![
            page(&["/c/1"], Some("t1")),
            page(&["/c/1"], Some("t2")),
            page(&["/c/2"], Some("t3")),
            page(&["/c/2"], Some("t4")),
            page(&["/c/2"], Some("t5")),
        ]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        assert_eq!(item_ids(&outcome), ["/c/1", "/c/2"]);
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test]
    async fn stops_when_cursor_is_absent() {
        let source = ScriptedSource::new(vec![page(&["/c/1"], None)]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn records_without_identifier_are_dropped() {
        let source = ScriptedSource::new(vec![Ok(FeedPage {
            feed_contents: vec![json!({"id": "/c/1"}), json!({"title": "orphan"})],
            next_token: None,
        })]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        assert_eq!(item_ids(&outcome), ["/c/1"]);
        assert_eq!(outcome.missing_id, 1);
    }

    #[tokio::test]
    async fn auth_expiry_is_fatal_and_not_retried() {
        let source = ScriptedSource::new(vec![
            page(&["/c/1"], Some("t1")),
            Err(FetchError::AuthExpired),
        ]);

        let config = fast_config();
        let result = FetchLoop::new(&source, &config).fetch_all().await;

        assert!(matches!(result, Err(FetchError::AuthExpired)));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn transient_failures_retry_then_return_partial_results() {
        let source = ScriptedSource::new(vec![
            page(&["/c/1"], Some("t1")),
            Err(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            Err(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            Err(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
        ]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        // First page survives; the second burned all three attempts.
        assert_eq!(item_ids(&outcome), ["/c/1"]);
        assert_eq!(source.calls(), 4);
        assert!(outcome.failure.unwrap().contains("3 attempts"));
    }

    #[tokio::test]
    async fn transient_failure_recovers_within_retry_limit() {
        let source = ScriptedSource::new(vec![
            Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)),
            page(&["/c/1"], None),
        ]);

        let config = fast_config();
        let outcome = FetchLoop::new(&source, &config).fetch_all().await.unwrap();

        assert_eq!(item_ids(&outcome), ["/c/1"]);
        assert!(outcome.failure.is_none());
    }
}
