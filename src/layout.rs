//! Piece geometry for a download.
//!
//! A [`DownloadTarget`] is what the pre-flight request discovered about the
//! remote resource. [`PieceLayout`] turns that into fixed-size pieces, each one
//! the unit of a ranged fetch and a positional write.

/// Upper bound on a derived piece size.
pub const MAX_PIECE_SIZE: u64 = 64 * 1024;

/// Immutable description of the remote resource, created once before any
/// piece work begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// The URL every request is issued against.
    pub url: String,
    /// `Content-Length` of the resource, `None` when the server omitted it.
    pub total_size: Option<u64>,
    /// Whether the server advertised `Accept-Ranges`.
    pub supports_range: bool,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl DownloadTarget {
    /// Whether the resource can be split into concurrently fetched pieces.
    pub fn is_segmentable(&self) -> bool {
        self.supports_range && self.total_size.is_some()
    }

    /// The number of workers that will actually run for a requested
    /// concurrency. Anything that cannot be segmented runs on one worker.
    pub fn effective_concurrency(&self, requested: usize) -> usize {
        if self.is_segmentable() {
            requested.max(1)
        } else {
            1
        }
    }
}

/// An inclusive byte range, rendered as an HTTP `Range` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `bytes=<start>-<end>`
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// How a resource is cut into pieces.
///
/// A piece size of `0` means the size is unknown and the whole body is a
/// single piece of unbounded length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceLayout {
    piece_size: u64,
    piece_count: usize,
    total_size: Option<u64>,
    segmented: bool,
}

impl PieceLayout {
    /// Derives the layout for `target` when fetched with `concurrency`
    /// workers.
    ///
    /// * size unknown: one unbounded piece, piece size `0`.
    /// * no range support: one piece spanning the whole body.
    /// * otherwise: `piece_size` if given, else
    ///   `min(MAX_PIECE_SIZE, ceil(total / concurrency))`.
    pub fn derive(target: &DownloadTarget, concurrency: usize, piece_size: Option<u64>) -> Self {
        let Some(total) = target.total_size else {
            return Self {
                piece_size: 0,
                piece_count: 1,
                total_size: None,
                segmented: false,
            };
        };

        if total == 0 {
            return Self {
                piece_size: 0,
                piece_count: 0,
                total_size: Some(0),
                segmented: false,
            };
        }

        if !target.supports_range {
            return Self {
                piece_size: total,
                piece_count: 1,
                total_size: Some(total),
                segmented: false,
            };
        }

        let concurrency = concurrency.max(1) as u64;
        let piece_size = match piece_size.filter(|s| *s > 0) {
            Some(size) => size,
            None => MAX_PIECE_SIZE.min(total.div_ceil(concurrency)),
        };

        Self {
            piece_size,
            piece_count: total.div_ceil(piece_size) as usize,
            total_size: Some(total),
            segmented: true,
        }
    }

    pub fn piece_size(&self) -> u64 {
        self.piece_size
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Whether pieces are fetched with a `Range` header.
    pub fn is_segmented(&self) -> bool {
        self.segmented
    }

    /// File offset where piece `index` starts.
    pub fn offset(&self, index: usize) -> u64 {
        index as u64 * self.piece_size
    }

    /// Byte range of piece `index`, clamped to the end of the resource.
    ///
    /// Returns `None` for an out-of-range index and for the single piece of a
    /// resource whose size is unknown.
    pub fn range(&self, index: usize) -> Option<ByteRange> {
        if index >= self.piece_count {
            return None;
        }
        let total = self.total_size?;
        let start = self.offset(index);
        let end = (start + self.piece_size - 1).min(total - 1);
        Some(ByteRange { start, end })
    }

    /// The range to put on the wire for piece `index`. Unsegmented layouts
    /// fetch the whole body without a `Range` header.
    pub fn request_range(&self, index: usize) -> Option<ByteRange> {
        if self.segmented { self.range(index) } else { None }
    }

    /// Exact number of bytes piece `index` must carry, `None` when unbounded.
    pub fn expected_len(&self, index: usize) -> Option<u64> {
        self.range(index).map(|r| r.len())
    }
}
