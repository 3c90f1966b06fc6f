//! # piecefetch
//!
//! `piecefetch` downloads a file over HTTP in parallel byte-range pieces.
//! Each piece is written straight to its offset in a preallocated output
//! file, and a completion bitmap records which pieces are done so that a
//! failed piece is simply handed out again.
//!
//! The moving parts:
//! - [`negotiate`] asks the server whether it serves ranges and how big the
//!   file is;
//! - [`layout`] turns that into pieces;
//! - [`store::PieceStore`] owns the bitmap and the file;
//! - [`scheduler::Scheduler`] runs a fixed pool of [`worker`]s against the
//!   store through a [`fetch::RangeFetcher`].

pub mod args;
pub mod config;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod negotiate;
pub mod observer;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod utils;
pub mod worker;

pub use args::Args;
pub use config::{DownloadConfig, Settings};
pub use downloader::{download, prepare_download};
pub use error::PieceError;
pub use layout::{ByteRange, DownloadTarget, PieceLayout};
pub use scheduler::{RunSummary, Scheduler};
pub use store::PieceStore;
