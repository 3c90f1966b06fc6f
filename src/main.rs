use anyhow::Result;
use clap::Parser;
use piecefetch::observer::{ConsoleObserver, NoopObserver, ProgressObserver};
use piecefetch::{Args, Settings, prepare_download};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("piecefetch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load()?;
    let config = args.to_config(&settings);

    println!("Starting download for: {}", config.url);
    let prepared = prepare_download(&config).await?;

    let observer: Arc<dyn ProgressObserver> = if args.quiet {
        Arc::new(NoopObserver)
    } else {
        Arc::new(ConsoleObserver::new(prepared.store.layout().total_size()))
    };

    let summary = prepared.scheduler(&config, observer).run().await?;

    println!(
        "Download completed: {} ({} bytes, {} pieces)",
        prepared.store.path().display(),
        summary.bytes,
        summary.pieces
    );
    Ok(())
}
