//! Small helpers: output file naming and size formatting.
use percent_encoding::percent_decode_str;
use sanitize_filename::sanitize;
use url::Url;

/// Name used when the URL has no usable last path segment.
pub const FALLBACK_FILENAME: &str = "download";

/// Derives the output file name from the last path segment of a URL.
///
/// The segment is percent-decoded and sanitized for the local filesystem;
/// query strings and fragments are ignored.
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .map(|s| percent_decode_str(&s).decode_utf8_lossy().to_string())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Size in mebibytes with one decimal, e.g. `"1.5 MB"`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}
