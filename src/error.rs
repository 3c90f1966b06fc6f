//! Failures of a single piece.
//!
//! Nothing in here aborts a download on its own: the worker logs the error,
//! releases the piece and asks the retry policy what to do next. Setup
//! failures are plain `anyhow` errors raised before any worker starts.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PieceError {
    /// The request could not be sent or the connection dropped.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with something other than 200 or 206.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The body could not be read to the end.
    #[error("failed to read body: {0}")]
    Body(String),

    #[error("piece {index}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[error("piece {index}: write failed: {source}")]
    Io {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("piece {0} is outside the layout")]
    OutOfRange(usize),

    /// A commit for a piece that is not currently claimed. Either it was
    /// already written or it was never handed out.
    #[error("piece {0} is not claimed")]
    NotClaimed(usize),

    /// The retry policy gave up on a piece.
    #[error("piece {index} failed after {attempts} attempts: {last}")]
    Exhausted {
        index: usize,
        attempts: u32,
        last: Box<PieceError>,
    },
}

impl PieceError {
    /// Whether the failure came from the local disk rather than the source.
    pub fn is_local(&self) -> bool {
        matches!(self, PieceError::Io { .. })
    }
}
