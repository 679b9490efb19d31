//! Ingestion orchestration: fetch, normalize, upsert, report.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::extract;
use crate::fetch::{FeedSource, FetchError, FetchLoop, HttpFeedSource};
use crate::repository::{ArticleRepository, DieselError};

/// Summary of one ingestion cycle.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub pages_fetched: u32,
    /// Unique raw records the fetch loop yielded.
    pub fetched: usize,
    pub duplicates_skipped: u32,
    /// Records the fetch loop dropped for lacking an identifier.
    pub missing_id: u32,
    pub parsed: usize,
    /// Records the extractor skipped as malformed.
    pub parse_skipped: usize,
    pub stored: usize,
    pub created: usize,
    pub snapshotted: usize,
    /// Present when the fetch loop gave up early; counts above are partial.
    pub fetch_failure: Option<String>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] DieselError),
}

/// Serializes ingestion cycles: at most one runs at a time, and a trigger
/// arriving while one is in flight is rejected rather than queued.
pub struct RefreshCoordinator {
    slot: Arc<Semaphore>,
    last_update: RwLock<Option<DateTime<Utc>>>,
    last_report: RwLock<Option<IngestReport>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            last_update: RwLock::new(None),
            last_report: RwLock::new(None),
        }
    }

    /// Claim the single ingest slot. None while a cycle is running.
    pub fn try_begin(&self) -> Option<OwnedSemaphorePermit> {
        self.slot.clone().try_acquire_owned().ok()
    }

    pub fn is_updating(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// When the last successful cycle finished.
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.read().await
    }

    #[allow(dead_code)]
    pub async fn last_report(&self) -> Option<IngestReport> {
        self.last_report.read().await.clone()
    }

    async fn record(&self, report: &IngestReport) {
        *self.last_update.write().await = Some(Utc::now());
        *self.last_report.write().await = Some(report.clone());
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one fetch → normalize → upsert cycle against the given source.
///
/// Fetch exhaustion is carried in the report (partial results still get
/// stored); an expired session and store errors surface as errors.
pub async fn run_ingest<S: FeedSource>(
    settings: &Settings,
    repo: &ArticleRepository,
    source: &S,
) -> Result<IngestReport, IngestError> {
    let feed = &settings.config.feed;
    let outcome = FetchLoop::new(source, feed).fetch_all().await?;

    let mut report = IngestReport {
        pages_fetched: outcome.pages_fetched,
        fetched: outcome.items.len(),
        duplicates_skipped: outcome.duplicates_skipped,
        missing_id: outcome.missing_id,
        fetch_failure: outcome.failure,
        ..IngestReport::default()
    };

    let articles = extract::parse_articles(&outcome.items, feed, &settings.config.scoring);
    report.parsed = articles.len();
    report.parse_skipped = report.fetched - report.parsed;

    for article in &articles {
        let upserted = repo.upsert(article).await?;
        report.stored += 1;
        if upserted.created {
            report.created += 1;
        }
        if upserted.snapshotted {
            report.snapshotted += 1;
        }
    }

    info!(
        "ingest cycle complete: {} stored ({} new, {} snapshots)",
        report.stored, report.created, report.snapshotted
    );
    Ok(report)
}

/// Background cycle entry point used by the HTTP refresh trigger.
///
/// Holds the coordinator permit for the duration and never propagates an
/// error: a failed cycle must not take down the serving side.
pub async fn run_cycle(
    permit: OwnedSemaphorePermit,
    coordinator: Arc<RefreshCoordinator>,
    settings: Arc<Settings>,
    repo: Arc<ArticleRepository>,
) {
    let _permit = permit;

    let source = match HttpFeedSource::new(&settings.config.feed, &settings.cookie_path()) {
        Ok(source) => source,
        Err(e) => {
            error!("refresh aborted: {}", e);
            return;
        }
    };

    match run_ingest(&settings, &repo, &source).await {
        Ok(report) => {
            if let Some(failure) = &report.fetch_failure {
                warn!("refresh finished with partial results: {}", failure);
            }
            coordinator.record(&report).await;
        }
        Err(e) => error!("refresh failed: {}", e),
    }
}
