//! Bounded concurrent processing of top-level locators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use super::locator::Locator;
use super::outcome::{OutcomeKind, OutcomeRecord, ResolutionOutcome};
use crate::config::{ConfigError, MAX_WORKERS, MIN_WORKERS};
use crate::frontier::{NO_RESOURCE_IN_PAGE, PageCrawler};

/// Errors that stop a whole run.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Live counters of a run, shared with progress reporting.
#[derive(Debug, Default)]
pub struct PoolStats {
    documents: AtomicUsize,
    datasets: AtomicUsize,
    duplicates: AtomicUsize,
    pages_without_result: AtomicUsize,
    unreachable: AtomicUsize,
}

impl PoolStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one finished locator.
    pub fn record(&self, outcome: &ResolutionOutcome) {
        let counter = match outcome.kind {
            OutcomeKind::Document => &self.documents,
            OutcomeKind::Dataset => &self.datasets,
            OutcomeKind::Duplicate => &self.duplicates,
            OutcomeKind::Unreachable | OutcomeKind::Page
                if outcome.comment == NO_RESOURCE_IN_PAGE =>
            {
                &self.pages_without_result
            }
            OutcomeKind::Unreachable | OutcomeKind::Page => &self.unreachable,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Locators finished so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.summary().total()
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn summary(&self) -> PoolSummary {
        PoolSummary {
            documents: self.documents.load(Ordering::SeqCst),
            datasets: self.datasets.load(Ordering::SeqCst),
            duplicates: self.duplicates.load(Ordering::SeqCst),
            pages_without_result: self.pages_without_result.load(Ordering::SeqCst),
            unreachable: self.unreachable.load(Ordering::SeqCst),
            skipped: 0,
        }
    }
}

/// Final counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// New documents.
    pub documents: usize,
    /// New datasets.
    pub datasets: usize,
    /// Resources already found by another locator.
    pub duplicates: usize,
    /// Crawlable pages whose links led nowhere.
    pub pages_without_result: usize,
    /// Everything else.
    pub unreachable: usize,
    /// Locators never dispatched because of shutdown.
    pub skipped: usize,
}

impl PoolSummary {
    /// Locators that produced an outcome.
    #[must_use]
    pub fn total(&self) -> usize {
        self.documents + self.datasets + self.duplicates + self.pages_without_result + self.unreachable
    }

    /// Locators that produced a document, dataset or duplicate.
    #[must_use]
    pub fn valid(&self) -> usize {
        self.documents + self.datasets + self.duplicates
    }
}

/// Runs one [`PageCrawler::crawl`] per locator on at most `workers` tasks.
///
/// Every outcome is sent to the sink as an [`OutcomeRecord`]. Once the
/// shutdown flag is set no further locator is dispatched; tasks already
/// running finish on their own timeouts.
#[derive(Debug)]
pub struct WorkerPool {
    crawler: Arc<PageCrawler>,
    semaphore: Arc<Semaphore>,
    workers: usize,
    stats: Arc<PoolStats>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Creates a pool with `workers` concurrent tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWorkers`] if `workers` is outside
    /// [`MIN_WORKERS`]..=[`MAX_WORKERS`].
    pub fn new(crawler: Arc<PageCrawler>, workers: usize) -> Result<Self, ConfigError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(ConfigError::InvalidWorkers { value: workers });
        }
        debug!(workers, "creating worker pool");
        Ok(Self {
            crawler,
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            stats: Arc::new(PoolStats::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Configured concurrency.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Live counters.
    #[must_use]
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Flag that stops dispatching when set.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Processes every locator and returns the final counts.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SemaphoreClosed`] if the semaphore is closed.
    ///
    /// Individual resolution failures never fail the run; they become
    /// unreachable records.
    pub async fn run<I>(
        &self,
        locators: I,
        sink: mpsc::Sender<OutcomeRecord>,
    ) -> Result<PoolSummary, PoolError>
    where
        I: IntoIterator<Item = Locator>,
    {
        let mut handles = Vec::new();
        let mut skipped = 0;
        let mut locators = locators.into_iter();

        info!(workers = self.workers, "starting resolution run");

        while let Some(locator) = locators.next() {
            if self.is_shutting_down() {
                skipped = 1 + locators.by_ref().count();
                break;
            }

            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PoolError::SemaphoreClosed)?;

            // Shutdown may have arrived while waiting for a permit.
            if self.is_shutting_down() {
                skipped = 1 + locators.by_ref().count();
                break;
            }

            debug!(id = locator.id_or_empty(), url = %locator.source_url, "dispatching locator");

            let crawler = Arc::clone(&self.crawler);
            let stats = Arc::clone(&self.stats);
            let sink = sink.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;

                let outcome = crawler.crawl(&locator).await;
                stats.record(&outcome);
                if sink.send(outcome.to_record()).await.is_err() {
                    warn!(id = locator.id_or_empty(), "outcome sink closed, record dropped");
                }
            }));
        }

        if skipped > 0 {
            warn!(skipped, "shutdown requested, remaining locators not dispatched");
        }

        debug!(task_count = handles.len(), "waiting for resolutions to complete");

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "resolution task panicked");
            }
        }

        let summary = PoolSummary {
            skipped,
            ..self.stats.summary()
        };
        let engine = self.crawler.engine();
        info!(
            documents = summary.documents,
            datasets = summary.datasets,
            duplicates = summary.duplicates,
            pages_without_result = summary.pages_without_result,
            unreachable = summary.unreachable,
            skipped = summary.skipped,
            blacklisted_domains = engine.health().blacklisted_count(),
            tls_blacklisted_domains = engine.health().tls_blacklisted_count(),
            connection_attempts = engine.manager().attempts(),
            "resolution run complete"
        );

        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn locator() -> Locator {
        Locator::page(Some("1".into()), "https://repo.org/record/1")
    }

    // ==================== Stats Tests ====================

    #[test]
    fn test_stats_count_each_kind() {
        let stats = PoolStats::new();
        let loc = locator();
        stats.record(&ResolutionOutcome::new(&loc, OutcomeKind::Document));
        stats.record(&ResolutionOutcome::new(&loc, OutcomeKind::Dataset));
        stats.record(&ResolutionOutcome::duplicate(&loc, "https://repo.org/a.pdf", "0"));
        stats.record(&ResolutionOutcome::unreachable(&loc, NO_RESOURCE_IN_PAGE));
        stats.record(&ResolutionOutcome::unreachable(&loc, "HTTP 404 Client Error"));

        let summary = stats.summary();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.datasets, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.pages_without_result, 1);
        assert_eq!(summary.unreachable, 1);
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.valid(), 3);
        assert_eq!(stats.processed(), 5);
    }

    #[test]
    fn test_summary_default_is_empty() {
        let summary = PoolSummary::default();
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.skipped, 0);
    }
}
