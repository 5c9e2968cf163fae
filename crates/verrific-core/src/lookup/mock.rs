//! In-process lookup service for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{LookupError, LookupQuery, LookupResult, LookupService};

type Responder = dyn Fn(&LookupQuery) -> Result<serde_json::Value, LookupError> + Send + Sync;

/// A hand-rolled [`LookupService`] for tests.
///
/// Answers through a responder closure, optionally after a simulated latency,
/// and records every query plus the highest number of concurrent calls seen.
pub struct MockLookup {
    responder: Box<Responder>,
    delay: Option<Duration>,
    queries: Mutex<Vec<LookupQuery>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLookup {
    pub fn new(
        responder: impl Fn(&LookupQuery) -> Result<serde_json::Value, LookupError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            queries: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A mock that gives every query the same answer.
    pub fn always(response: Result<serde_json::Value, LookupError>) -> Self {
        Self::new(move |_| response.clone())
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn queries(&self) -> Vec<LookupQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Highest number of lookups that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl LookupService for MockLookup {
    fn name(&self) -> &str {
        "mock"
    }

    fn lookup<'a>(&'a self, query: &'a LookupQuery, _timeout: Duration) -> LookupResult<'a> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }

        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let response = (self.responder)(query);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            response
        })
    }
}
