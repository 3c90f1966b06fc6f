//! Progress reporting seam between the download engine and whatever shows
//! progress to the user.
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Receives progress events from workers. Implementations must be cheap and
/// callable from many tasks at once.
pub trait ProgressObserver: Send + Sync {
    /// `bytes` more bytes were committed to the output file.
    fn inc(&self, bytes: u64);
    /// A short status line, e.g. a retry notice.
    fn message(&self, msg: String);
    /// The download finished.
    fn finish(&self);
    /// The download stopped without finishing.
    fn abandon(&self, msg: String);
}

/// Drives an `indicatif` progress bar.
pub struct ConsoleObserver {
    pub pb: ProgressBar,
}

impl ConsoleObserver {
    /// A byte bar when the size is known, a spinner otherwise.
    pub fn new(total_size: Option<u64>) -> Self {
        let pb = match total_size {
            Some(total) => {
                let pb = ProgressBar::new(total);
                pb.set_style(
                    ProgressStyle::with_template(
                        "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::with_template("{spinner} {msg} {bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            }
        };
        Self { pb }
    }
}

impl ProgressObserver for ConsoleObserver {
    fn inc(&self, bytes: u64) {
        self.pb.inc(bytes);
    }

    fn message(&self, msg: String) {
        self.pb.set_message(msg);
    }

    fn finish(&self) {
        self.pb.finish_with_message("Done!");
    }

    fn abandon(&self, msg: String) {
        self.pb.abandon_with_message(msg);
    }
}

/// Discards every event.
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn inc(&self, _bytes: u64) {}

    fn message(&self, _msg: String) {}

    fn finish(&self) {}

    fn abandon(&self, _msg: String) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_observer_counts_bytes() {
        let observer = ConsoleObserver {
            pb: ProgressBar::hidden(),
        };
        observer.pb.set_length(10);
        observer.inc(4);
        observer.inc(6);
        assert_eq!(observer.pb.position(), 10);

        observer.finish();
        assert!(observer.pb.is_finished());
    }

    #[test]
    fn test_console_observer_abandon_stops_bar() {
        let observer = ConsoleObserver {
            pb: ProgressBar::hidden(),
        };
        observer.abandon("Failed: piece 2".to_string());
        assert!(observer.pb.is_finished());
        assert_eq!(observer.pb.message(), "Failed: piece 2");
    }
}
