//! Fixed-size worker pool over a [`PieceStore`].
use crate::fetch::RangeFetcher;
use crate::observer::ProgressObserver;
use crate::retry::RetryPolicy;
use crate::store::PieceStore;
use crate::worker::{WorkerContext, run_worker};
use anyhow::{Context, Result};
use futures_util::future::join_all;
use std::sync::Arc;

/// Totals for a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub pieces: usize,
    pub bytes: u64,
    pub failed_attempts: u64,
}

/// Launches `concurrency` workers once, joins them once, then waits on the
/// store's completion barrier.
pub struct Scheduler {
    ctx: WorkerContext,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(
        store: Arc<PieceStore>,
        fetcher: Arc<dyn RangeFetcher>,
        observer: Arc<dyn ProgressObserver>,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ctx: WorkerContext::new(store, fetcher, observer, retry),
            concurrency: concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<PieceStore> {
        &self.ctx.store
    }

    /// Runs the download to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker panics, if the retry policy gives up on a
    /// piece, or if the finished file cannot be synced to disk.
    pub async fn run(self) -> Result<RunSummary> {
        let store = self.ctx.store.clone();
        tracing::info!(
            workers = self.concurrency,
            pieces = store.layout().piece_count(),
            piece_size = store.layout().piece_size(),
            "starting download"
        );

        let tasks: Vec<_> = (0..self.concurrency)
            .map(|id| tokio::spawn(run_worker(id, self.ctx.clone())))
            .collect();

        let mut summary = RunSummary::default();
        let mut failure: Option<anyhow::Error> = None;
        for result in join_all(tasks).await {
            match result {
                Ok(Ok(report)) => {
                    summary.pieces += report.pieces;
                    summary.bytes += report.bytes;
                }
                Ok(Err(e)) => {
                    failure.get_or_insert_with(|| {
                        anyhow::Error::new(e).context("Download did not complete")
                    });
                }
                Err(e) => {
                    failure.get_or_insert_with(|| anyhow::Error::new(e).context("Worker task panicked"));
                }
            }
        }
        summary.failed_attempts = self.ctx.failed_attempts();

        if let Some(e) = failure {
            self.ctx.observer.abandon(format!("Failed: {:#}", e));
            return Err(e);
        }

        store.wait_complete().await;
        if let Err(e) = store.sync().await {
            self.ctx.observer.abandon(format!("Failed: {}", e));
            return Err(e).with_context(|| format!("Failed to sync {}", store.path().display()));
        }
        self.ctx.observer.finish();

        tracing::info!(
            pieces = summary.pieces,
            bytes = summary.bytes,
            retries = summary.failed_attempts,
            "download complete"
        );
        Ok(summary)
    }
}
