//! Batched reconciliation of large file sets against a manifest.
//!
//! An index may enumerate tens of thousands of entries; checking and
//! fetching them all at once risks file-descriptor exhaustion and host
//! throttling. Entries are therefore processed in fixed-size batches with
//! bounded fan-out inside each batch, and the batch boundary is a barrier:
//! the next batch does not start until every task of the current one has
//! settled.

use std::path::Path;

use futures::StreamExt;
use reqwest::Client;

use lumen_schema::manifest::{IndexDocument, ManifestEntry};

use crate::fetch::{FetchOptions, FetchRequest};
use crate::verify::verify_file;

/// Tuning for a reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Entries per batch. The legacy updater hardcoded 2500; kept as the
    /// default but configurable.
    pub batch_size: usize,
    /// Concurrent verify+fetch tasks within one batch.
    pub concurrency: usize,
    /// Transfer tuning for entry fetches.
    pub fetch: FetchOptions,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            batch_size: 2500,
            concurrency: 32,
            fetch: FetchOptions::default(),
        }
    }
}

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Entries whose local file already matched.
    pub matched: usize,
    /// Entries fetched because they were missing or stale.
    pub fetched: usize,
    /// Entries whose fetch failed; reported, never fatal.
    pub failed: usize,
}

impl ReconcileStats {
    /// Total entries examined.
    pub fn total(&self) -> usize {
        self.matched + self.fetched + self.failed
    }

    fn absorb(&mut self, other: EntryOutcome) {
        match other {
            EntryOutcome::Matched => self.matched += 1,
            EntryOutcome::Fetched => self.fetched += 1,
            EntryOutcome::Failed => self.failed += 1,
        }
    }
}

enum EntryOutcome {
    Matched,
    Fetched,
    Failed,
}

/// Reconcile a parsed index document under `base_dir`.
///
/// Per-entry failures are logged and counted; the pass itself always
/// completes. Obtaining the index in the first place is the caller's
/// responsibility (and the only hard failure mode of reconciliation).
pub async fn reconcile(
    client: &Client,
    document: &IndexDocument,
    base_dir: &Path,
    options: &ReconcileOptions,
) -> ReconcileStats {
    reconcile_entries(client, &document.entries, base_dir, options).await
}

/// Reconcile an explicit entry list under `base_dir`.
pub async fn reconcile_entries(
    client: &Client,
    entries: &[ManifestEntry],
    base_dir: &Path,
    options: &ReconcileOptions,
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();
    let batch_size = options.batch_size.max(1);
    let total_batches = entries.len().div_ceil(batch_size).max(1);

    for (batch_no, batch) in entries.chunks(batch_size).enumerate() {
        tracing::info!(
            batch = batch_no + 1,
            of = total_batches,
            entries = batch.len(),
            "checking batch"
        );
        // Barrier: collect() drains the whole batch before the next starts.
        let outcomes: Vec<EntryOutcome> = futures::stream::iter(batch)
            .map(|entry| process_entry(client, entry, base_dir, options))
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;
        for outcome in outcomes {
            stats.absorb(outcome);
        }
    }

    tracing::info!(
        matched = stats.matched,
        fetched = stats.fetched,
        failed = stats.failed,
        "reconciliation complete"
    );
    stats
}

async fn process_entry(
    client: &Client,
    entry: &ManifestEntry,
    base_dir: &Path,
    options: &ReconcileOptions,
) -> EntryOutcome {
    let dest = base_dir.join(&entry.local_path);
    if verify_file(&dest, &entry.hash).await {
        return EntryOutcome::Matched;
    }

    let result = FetchRequest::new(client, &entry.url, &dest)
        .expecting(&entry.hash)
        .verify_after()
        .with_options(options.fetch.clone())
        .execute()
        .await;

    match result {
        Ok(_) => EntryOutcome::Fetched,
        Err(err) => {
            tracing::warn!(
                path = %entry.local_path.display(),
                "failed to fetch entry: {err}"
            );
            EntryOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_total_sums_outcomes() {
        let stats = ReconcileStats {
            matched: 3,
            fetched: 2,
            failed: 1,
        };
        assert_eq!(stats.total(), 6);
    }

    #[test]
    fn default_batch_size_matches_legacy_constant() {
        assert_eq!(ReconcileOptions::default().batch_size, 2500);
    }
}
