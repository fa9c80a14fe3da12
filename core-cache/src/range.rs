//! # Range Slicer
//!
//! Serves byte ranges out of a fully cached body the way the origin media
//! server would.
//!
//! ## Overview
//!
//! Accepted forms are `bytes=N-M`, `bytes=N-` and `bytes=-N`. Anything else,
//! including multi-range requests, degrades to the complete body with status
//! 200. A range that cannot be satisfied yields 416 with
//! `Content-Range: bytes */{size}`.
//!
//! Before slicing, the stored body is checked against its recorded
//! `content-length`. A mismatch means the entry was truncated or corrupted
//! and is reported as [`CacheError::CorruptEntry`] so the caller can evict it
//! and go to the network instead.

use crate::error::{CacheError, Result};
use bridge_traits::HttpResponse;

/// Headers copied from the stored response onto a 206.
const FORWARDED_HEADERS: &[&str] = &["content-type", "etag", "last-modified", "cache-control"];

/// Inclusive byte range within a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a body of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// How a `Range` header applies to a body of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Header not understood; serve everything.
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Parses a single bound. Non-digit input is `Err`; overflow saturates.
fn parse_bound(raw: &str) -> std::result::Result<Option<u64>, ()> {
    if raw.is_empty() {
        return Ok(None);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(());
    }
    Ok(Some(raw.parse::<u64>().unwrap_or(u64::MAX)))
}

/// Resolves `header` against a body of `size` bytes.
pub fn parse_range(header: &str, size: u64) -> RangeOutcome {
    let header = header.trim();
    let Some((unit, ranges)) = header.split_once('=') else {
        return RangeOutcome::Full;
    };
    if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = ranges.split_once('-') else {
        return RangeOutcome::Full;
    };

    let (first, last) = match (parse_bound(first.trim()), parse_bound(last.trim())) {
        (Ok(first), Ok(last)) => (first, last),
        _ => return RangeOutcome::Full,
    };

    match (first, last) {
        (None, None) => RangeOutcome::Unsatisfiable,
        // Suffix: the last N bytes
        (None, Some(suffix)) => {
            if suffix == 0 || size == 0 {
                return RangeOutcome::Unsatisfiable;
            }
            RangeOutcome::Partial(ByteRange {
                start: size.saturating_sub(suffix),
                end: size - 1,
            })
        }
        (Some(start), last) => {
            if start >= size {
                return RangeOutcome::Unsatisfiable;
            }
            let end = match last {
                Some(end) if end < start => return RangeOutcome::Unsatisfiable,
                Some(end) => end.min(size - 1),
                None => size - 1,
            };
            RangeOutcome::Partial(ByteRange { start, end })
        }
    }
}

/// Fails when the stored `content-length` disagrees with the body.
pub fn verify_integrity(key: &str, response: &HttpResponse) -> Result<()> {
    let actual = response.body.len() as u64;
    let recorded = response
        .header("content-length")
        .and_then(|v| v.trim().parse::<u64>().ok());

    match recorded {
        Some(expected) if expected != actual => Err(CacheError::CorruptEntry {
            key: key.to_string(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Builds the response for `range_header` from a fully stored response.
///
/// # Errors
///
/// Returns [`CacheError::CorruptEntry`] when the stored body fails
/// [`verify_integrity`].
pub fn slice(key: &str, stored: &HttpResponse, range_header: &str) -> Result<HttpResponse> {
    verify_integrity(key, stored)?;

    let size = stored.body.len() as u64;

    match parse_range(range_header, size) {
        RangeOutcome::Full => Ok(stored.clone().with_header("accept-ranges", "bytes")),
        RangeOutcome::Unsatisfiable => Ok(HttpResponse::new(416)
            .with_header("content-range", format!("bytes */{}", size))),
        RangeOutcome::Partial(range) => {
            let mut response = HttpResponse::new(206);
            for name in FORWARDED_HEADERS {
                if let Some(value) = stored.header(name) {
                    response = response.with_header(*name, value);
                }
            }

            // end < size, so both bounds fit in usize
            let body = stored
                .body
                .slice(range.start as usize..(range.end + 1) as usize);

            Ok(response
                .with_header("content-range", range.content_range(size))
                .with_header("content-length", range.byte_count().to_string())
                .with_header("accept-ranges", "bytes")
                .with_body(body))
        }
    }
}
