//! Batch resolution over a bounded worker pool
//!
//! Resolution is network-bound, so the pool is a fixed number of
//! concurrent futures rather than CPU threads. One slow artifact only
//! holds its own slot.

use super::cache::ResolutionCatalog;
use crate::license::Expression;
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};

/// Outcome of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// In input order
    pub results: Vec<(String, Expression)>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn fully_identified(&self) -> usize {
        self.results.iter().filter(|(_, e)| e.is_fully_identified()).count()
    }

    /// Keys whose result still carries unresolved evidence
    pub fn unresolved(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, e)| !e.is_fully_identified())
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Resolve every key with at most `workers` resolutions in flight
pub async fn resolve_all<S: AsRef<str>>(catalog: &ResolutionCatalog, keys: &[S], workers: usize) -> BatchReport {
    let start = Instant::now();

    let mut indexed: Vec<(usize, String, Expression)> = stream::iter(keys.iter().enumerate())
        .map(|(index, key)| async move {
            let key = key.as_ref().trim().to_string();
            let expression = catalog.get(&key).await;
            (index, key, expression)
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;
    indexed.sort_by_key(|(index, _, _)| *index);

    let report = BatchReport {
        results: indexed.into_iter().map(|(_, key, e)| (key, e)).collect(),
        elapsed_ms: millis(start.elapsed()),
    };
    tracing::info!(
        "Resolved {} artifact(s) in {}ms: {} fully identified",
        report.results.len(),
        report.elapsed_ms,
        report.fully_identified()
    );
    report
}

/// Whole milliseconds, saturating at `u64::MAX`
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
