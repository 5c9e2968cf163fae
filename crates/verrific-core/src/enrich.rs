//! Concurrent enrichment of references through a lookup service.
//!
//! Every reference gets its own lookup future; all of them are joined on the
//! calling task, so each future holds the only `&mut` to its reference and no
//! locking is needed. A semaphore caps how many lookups are in flight. A failed
//! lookup becomes a failure marker on that one reference, never a batch error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::lookup::glutton::GluttonClient;
use crate::lookup::{LookupQuery, LookupService};
use crate::{Enrichment, Reference};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Per-lookup timeout.
    pub timeout: Duration,
    /// Maximum number of lookups in flight.
    pub concurrency: usize,
    /// Optional bound on the whole batch. Lookups still pending when it
    /// expires are dropped and their references stay unenriched.
    pub deadline: Option<Duration>,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("concurrency limit must be at least 1")]
    InvalidConcurrency,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Per-reference progress, emitted as each reference settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichEvent {
    /// Nothing to query for this reference; no request was made.
    Skipped { index: usize, total: usize },
    /// The lookup finished, successfully or with a failure marker.
    Resolved {
        index: usize,
        total: usize,
        matched: bool,
    },
}

/// Outcome counts for one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub total: usize,
    pub matched: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Lookups dropped by cancellation or the batch deadline.
    pub abandoned: usize,
}

impl EnrichStats {
    pub fn looked_up(&self) -> usize {
        self.matched + self.failed
    }
}

#[derive(Default)]
struct Counters {
    matched: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl Counters {
    fn snapshot(&self, total: usize) -> EnrichStats {
        let matched = self.matched.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let skipped = self.skipped.load(Ordering::Relaxed);
        EnrichStats {
            total,
            matched,
            failed,
            skipped,
            abandoned: total.saturating_sub(matched + failed + skipped),
        }
    }
}

/// Enrich every reference through `lookup`.
///
/// Returns once every reference has been skipped or resolved, or earlier if
/// `cancel` fires or `options.deadline` expires. Only an invalid configuration
/// fails the call.
pub async fn enrich_references(
    refs: &mut [Reference],
    lookup: &dyn LookupService,
    options: &EnrichOptions,
    progress: impl Fn(EnrichEvent) + Send + Sync,
    cancel: CancellationToken,
) -> Result<EnrichStats, EnrichError> {
    if options.concurrency == 0 {
        return Err(EnrichError::InvalidConcurrency);
    }

    let total = refs.len();
    let gate = Semaphore::new(options.concurrency);
    let counters = Counters::default();

    tracing::info!(
        total,
        service = lookup.name(),
        concurrency = options.concurrency,
        "starting enrichment"
    );

    let completed = {
        let gate = &gate;
        let counters = &counters;
        let progress = &progress;
        let timeout = options.timeout;

        let lookups = refs
            .iter_mut()
            .enumerate()
            .map(move |(index, reference)| async move {
                let Some(query) = LookupQuery::for_reference(reference) else {
                    counters.skipped.fetch_add(1, Ordering::Relaxed);
                    progress(EnrichEvent::Skipped { index, total });
                    return;
                };

                let result = {
                    let Ok(_permit) = gate.acquire().await else {
                        return;
                    };
                    tracing::debug!(index, ?query, "lookup");
                    lookup.lookup(&query, timeout).await
                };

                let enrichment = match result {
                    Ok(body) => Enrichment::from_json(body),
                    Err(err) => {
                        tracing::debug!(index, error = %err, "lookup failed");
                        Enrichment::Failed(err.to_string())
                    }
                };
                let matched = enrichment.is_matched();
                if matched {
                    counters.matched.fetch_add(1, Ordering::Relaxed);
                } else {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
                reference.set_enrichment(enrichment);
                progress(EnrichEvent::Resolved {
                    index,
                    total,
                    matched,
                });
            });

        let deadline = async {
            match options.deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = join_all(lookups) => true,
            _ = cancel.cancelled() => {
                tracing::warn!("enrichment cancelled, abandoning pending lookups");
                false
            }
            _ = deadline => {
                tracing::warn!(deadline = ?options.deadline, "enrichment deadline expired, abandoning pending lookups");
                false
            }
        }
    };

    let stats = counters.snapshot(total);
    tracing::info!(
        completed,
        matched = stats.matched,
        failed = stats.failed,
        skipped = stats.skipped,
        abandoned = stats.abandoned,
        "enrichment finished"
    );
    Ok(stats)
}

/// Enrich against a biblio-glutton instance at `base_url`.
pub async fn enrich_with_glutton(
    refs: &mut [Reference],
    base_url: &str,
    options: &EnrichOptions,
) -> Result<EnrichStats, EnrichError> {
    let client = GluttonClient::new(base_url)?;
    enrich_references(refs, &client, options, |_| {}, CancellationToken::new()).await
}
