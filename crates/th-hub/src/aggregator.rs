//! Shared collection of discovered URLs

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use th_core::port::{wait_for_condition, WaitOutcome};
use th_core::DiscoveredUrl;

/// Mutex-protected, ordered list of results for one run.
///
/// Monitors only append; the reporter reads the count and takes snapshots
/// under the same lock, so "all resolved" is never observed mid-append.
#[derive(Default)]
pub struct ResultAggregator {
    results: Mutex<Vec<DiscoveredUrl>>,
}

impl ResultAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DiscoveredUrl>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a result
    pub fn push(&self, url: DiscoveredUrl) {
        self.lock().push(url);
    }

    /// Number of results so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing has been discovered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the results in append order
    pub fn snapshot(&self) -> Vec<DiscoveredUrl> {
        self.lock().clone()
    }

    /// Drop every result
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Wait until `expected` results are present, the timeout elapses, or
    /// `cancel` fires
    pub async fn wait_resolved(
        &self,
        expected: usize,
        interval: Duration,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        wait_for_condition(
            || {
                let resolved = self.len() >= expected;
                async move { resolved }
            },
            interval,
            timeout,
            cancel,
        )
        .await
    }
}
