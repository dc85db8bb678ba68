//! HTTP Range header resolution for partial-content delivery
//!
//! Only single `bytes=<start>-<end>` ranges are honoured. Anything else is
//! served as the whole resource: availability wins over strictness.

/// Concrete byte window to serve for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeWindow {
    /// Number of bytes in the window
    pub length: u64,
    /// First byte offset, inclusive
    pub start_byte: u64,
    /// Last byte offset, inclusive
    pub end_byte: u64,
    /// Size of the whole resource
    pub total_size: u64,
    /// True when a well-formed range was requested
    pub partial: bool,
}

impl RangeWindow {
    /// Window covering the whole resource.
    ///
    /// A zero-byte resource yields an empty window starting and ending at 0.
    pub fn whole(total_size: u64) -> Self {
        Self {
            length: total_size,
            start_byte: 0,
            end_byte: total_size.saturating_sub(1),
            total_size,
            partial: false,
        }
    }

    /// `Content-Range` header value for this window.
    ///
    /// An empty resource has no satisfiable range and is reported as `bytes */0`.
    pub fn content_range(&self) -> String {
        if self.total_size == 0 {
            return "bytes */0".to_string();
        }
        format!(
            "bytes {}-{}/{}",
            self.start_byte, self.end_byte, self.total_size
        )
    }
}

/// Resolves the window to serve for `range_header` against a resource of `total_size` bytes.
///
/// Absent or malformed headers produce the whole resource. The end offset
/// defaults to and is clamped at `total_size - 1`.
///
/// # Examples
/// ```
/// use waiter_core::range::compute_window;
///
/// let window = compute_window(1000, Some("bytes=900-5000"));
/// assert_eq!((window.start_byte, window.end_byte, window.length), (900, 999, 100));
/// ```
pub fn compute_window(total_size: u64, range_header: Option<&str>) -> RangeWindow {
    match range_header.and_then(|header| parse_byte_range(header, total_size)) {
        Some((start_byte, end_byte)) => RangeWindow {
            length: end_byte - start_byte + 1,
            start_byte,
            end_byte,
            total_size,
            partial: true,
        },
        None => RangeWindow::whole(total_size),
    }
}

/// Parses `bytes=<start>-<end>` into inclusive, clamped offsets.
///
/// Returns None for anything the window cannot honour: another unit, suffix
/// ranges, multiple ranges, non-numeric offsets, `start > end`, or a start at
/// or beyond the end of the resource.
fn parse_byte_range(header: &str, total_size: u64) -> Option<(u64, u64)> {
    let spec = header.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }

    let (start_str, end_str) = spec.split_once('-')?;
    let start = start_str.trim().parse::<u64>().ok()?;
    if start >= total_size {
        return None;
    }

    let last_byte = total_size - 1;
    let end = match end_str.trim() {
        "" => last_byte,
        value => value.parse::<u64>().ok()?.min(last_byte),
    };

    (start <= end).then_some((start, end))
}
