//! The per-worker loop: claim a piece, fetch it, commit it or hand it back.
use crate::error::PieceError;
use crate::fetch::RangeFetcher;
use crate::observer::ProgressObserver;
use crate::retry::RetryPolicy;
use crate::store::PieceStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::sleep;

/// State shared by every worker of one run.
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Arc<PieceStore>,
    pub fetcher: Arc<dyn RangeFetcher>,
    pub observer: Arc<dyn ProgressObserver>,
    pub retry: RetryPolicy,
    /// Failed attempts so far, per piece index.
    pub failures: Arc<[AtomicU32]>,
}

impl WorkerContext {
    pub fn new(
        store: Arc<PieceStore>,
        fetcher: Arc<dyn RangeFetcher>,
        observer: Arc<dyn ProgressObserver>,
        retry: RetryPolicy,
    ) -> Self {
        let failures = (0..store.layout().piece_count())
            .map(|_| AtomicU32::new(0))
            .collect();
        Self {
            store,
            fetcher,
            observer,
            retry,
            failures,
        }
    }

    /// Total failed attempts across all pieces.
    pub fn failed_attempts(&self) -> u64 {
        self.failures
            .iter()
            .map(|f| f.load(Ordering::Relaxed) as u64)
            .sum()
    }
}

/// What one worker got done before it ran out of pieces.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub pieces: usize,
    pub bytes: u64,
}

/// Runs one worker until the store has no piece left to hand out.
///
/// Every failure releases the piece and sleeps for the policy's delay before
/// claiming again. Since claims are first-fit, the piece that just failed is
/// usually the next one this worker gets back.
///
/// # Errors
///
/// Only when the retry policy gives up on a piece. The default policy never
/// does.
pub async fn run_worker(id: usize, ctx: WorkerContext) -> Result<WorkerReport, PieceError> {
    let mut report = WorkerReport::default();

    while let Some(index) = ctx.store.claim_next() {
        match download_piece(&ctx, index).await {
            Ok(bytes) => {
                report.pieces += 1;
                report.bytes += bytes;
                ctx.observer.inc(bytes);
            }
            Err(e) => {
                let failures = ctx.failures[index].fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(worker = id, index, attempt = failures, error = %e, "piece failed");
                ctx.store.release(index);

                if !ctx.retry.should_retry(failures) {
                    return Err(PieceError::Exhausted {
                        index,
                        attempts: failures,
                        last: Box::new(e),
                    });
                }

                let delay = ctx.retry.delay(failures);
                ctx.observer
                    .message(format!("Piece {}: {}. Retrying in {:?}...", index, e, delay));
                sleep(delay).await;
            }
        }
    }

    tracing::debug!(worker = id, pieces = report.pieces, "worker finished");
    Ok(report)
}

async fn download_piece(ctx: &WorkerContext, index: usize) -> Result<u64, PieceError> {
    let range = ctx.store.layout().request_range(index);
    let body = ctx.fetcher.fetch(range).await?;
    ctx.store.write_and_mark(index, &body).await?;
    Ok(body.len() as u64)
}
