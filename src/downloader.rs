//! Setup phase and the one-call entry point.
//!
//! Everything here runs before the first worker starts, so any error is
//! fatal for the run.
use crate::config::DownloadConfig;
use crate::fetch::{HttpFetcher, build_client};
use crate::layout::{DownloadTarget, PieceLayout};
use crate::negotiate::probe_target;
use crate::observer::ProgressObserver;
use crate::scheduler::{RunSummary, Scheduler};
use crate::store::PieceStore;
use crate::utils;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// A negotiated download, ready to schedule.
pub struct PreparedDownload {
    pub target: DownloadTarget,
    pub store: Arc<PieceStore>,
    /// Worker count after capability fallbacks.
    pub concurrency: usize,
    client: reqwest::Client,
}

impl PreparedDownload {
    /// Builds the scheduler for this download over HTTP.
    pub fn scheduler(&self, config: &DownloadConfig, observer: Arc<dyn ProgressObserver>) -> Scheduler {
        let fetcher = HttpFetcher::new(
            self.client.clone(),
            self.target.url.clone(),
            self.target.user_agent.clone(),
        );
        Scheduler::new(
            self.store.clone(),
            Arc::new(fetcher),
            observer,
            self.concurrency,
            config.retry,
        )
    }
}

/// Negotiates capabilities, derives the piece layout and creates the output
/// file.
///
/// # Errors
///
/// Returns an error if the client cannot be built, the pre-flight request
/// fails, or the output file cannot be created.
pub async fn prepare_download(config: &DownloadConfig) -> Result<PreparedDownload> {
    let client = build_client(config).context("Failed to build HTTP client")?;
    let target = probe_target(&client, &config.url, &config.user_agent).await?;

    if !target.supports_range {
        tracing::warn!("target does not support range requests, falling back to concurrency 1");
    }
    match target.total_size {
        Some(size) => tracing::info!(size, "download target size: {}", utils::format_megabytes(size)),
        None => tracing::warn!("target size unknown, downloading as a single piece"),
    }

    let concurrency = target.effective_concurrency(config.concurrency);
    let layout = PieceLayout::derive(&target, concurrency, config.piece_size);

    let path = output_path(config);
    let store = PieceStore::create(&path, layout)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    Ok(PreparedDownload {
        target,
        store: Arc::new(store),
        concurrency,
        client,
    })
}

/// `config.output`, or the URL's last path segment in the working directory.
pub fn output_path(config: &DownloadConfig) -> PathBuf {
    config
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(utils::filename_from_url(&config.url)))
}

/// Downloads `config.url` end to end.
pub async fn download(config: &DownloadConfig, observer: Arc<dyn ProgressObserver>) -> Result<RunSummary> {
    let prepared = prepare_download(config).await?;
    prepared.scheduler(config, observer).run().await
}
