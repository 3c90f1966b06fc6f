use piecefetch::observer::ConsoleObserver;
use piecefetch::{DownloadConfig, prepare_download};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = "https://proof.ovh.net/files/10Mb.dat";

    println!("Starting example download...");
    println!("URL: {}", url);

    let mut config = DownloadConfig::new(url);
    config.concurrency = 4;
    config.accept_invalid_certs = false;

    // Pre-flight: range support, size, piece layout, preallocated file.
    let prepared = prepare_download(&config).await?;
    println!(
        "{} pieces of {} bytes on {} workers",
        prepared.store.layout().piece_count(),
        prepared.store.layout().piece_size(),
        prepared.concurrency
    );

    let observer = Arc::new(ConsoleObserver::new(prepared.store.layout().total_size()));
    let summary = prepared.scheduler(&config, observer).run().await?;

    println!(
        "Download completed successfully: {} ({} bytes, {} retries)",
        prepared.store.path().display(),
        summary.bytes,
        summary.failed_attempts
    );
    Ok(())
}
