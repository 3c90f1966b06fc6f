use crate::config::{DEFAULT_USER_AGENT, DownloadConfig, Settings, default_concurrency};
use crate::retry::{Backoff, RetryPolicy};
use crate::utils;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for the exponential retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// A concurrent, segmented file downloader.
///
/// Splits the file into pieces, fetches them in parallel with HTTP range
/// requests and writes each one straight to its offset in the output file.
///
/// `-h` prints this help and exits with status 0. Invalid arguments, such as
/// `-c 0` or anything but exactly one URL, print usage and exit with status 2.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The URL of the file to download.
    pub url: String,

    /// Number of concurrent requests. Defaults to the number of CPUs.
    #[arg(short = 'c', long, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// User-Agent header sent with every request.
    #[arg(short = 'A', long)]
    pub user_agent: Option<String>,

    /// Output file. Defaults to the last segment of the URL path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Bytes per piece. Derived from size and concurrency when omitted.
    #[arg(long)]
    pub piece_size: Option<u64>,

    /// Pause after a failed piece, in milliseconds.
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Give up after this many failed attempts on one piece. Retries forever
    /// when omitted.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Double the retry delay after every consecutive failure.
    #[arg(long)]
    pub exponential: bool,

    /// Verify TLS certificates (off by default).
    #[arg(long)]
    pub verify_tls: bool,

    /// Do not show a progress bar.
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("concurrency must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    /// Builds the run configuration: flags first, then `settings`, then the
    /// built-in defaults.
    pub fn to_config(&self, settings: &Settings) -> DownloadConfig {
        let delay = Duration::from_millis(self.retry_delay_ms.or(settings.retry_delay_ms).unwrap_or(1000));
        let backoff = if self.exponential {
            Backoff::Exponential {
                base: delay,
                max: MAX_RETRY_DELAY.max(delay),
            }
        } else {
            Backoff::Fixed(delay)
        };

        let output = self.output.clone().or_else(|| {
            settings
                .output_dir
                .as_ref()
                .map(|dir| dir.join(utils::filename_from_url(&self.url)))
        });

        DownloadConfig {
            url: self.url.clone(),
            user_agent: self
                .user_agent
                .clone()
                .filter(|ua| !ua.is_empty())
                .or_else(|| settings.user_agent.clone().filter(|ua| !ua.is_empty()))
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            concurrency: self
                .concurrency
                .or(settings.concurrency.filter(|n| *n > 0))
                .unwrap_or_else(default_concurrency),
            piece_size: self.piece_size.or(settings.piece_size).filter(|s| *s > 0),
            accept_invalid_certs: !(self.verify_tls || settings.verify_tls.unwrap_or(false)),
            connect_timeout: settings.connect_timeout_secs.map(Duration::from_secs),
            output,
            retry: RetryPolicy {
                max_attempts: self.max_attempts.or(settings.max_attempts),
                backoff,
            },
        }
    }
}
