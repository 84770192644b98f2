//! `Range: bytes=...` parsing.

use crate::error::ArtifactError;

/// Inclusive byte span `[start, end]` of an artifact, already clamped to its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parse a single-range header value against an artifact of `size` bytes.
    ///
    /// Accepts `bytes=<start>-<end>`, `bytes=<start>-` and the suffix form
    /// `bytes=-<count>`. `end` is clamped to the last byte. Anything else,
    /// including multi-range requests, is reported as not satisfiable.
    pub fn parse(header: &str, size: u64) -> Result<Self, ArtifactError> {
        let unsatisfiable = || ArtifactError::RangeNotSatisfiable { size };

        let (unit, ranges) = header.trim().split_once('=').ok_or_else(unsatisfiable)?;
        if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
            return Err(unsatisfiable());
        }

        let (start, end) = ranges.split_once('-').ok_or_else(unsatisfiable)?;
        let (start, end) = (start.trim(), end.trim());
        if size == 0 {
            return Err(unsatisfiable());
        }
        let last = size - 1;

        let (start, end) = if start.is_empty() {
            let count = parse_position(end).ok_or_else(unsatisfiable)?;
            if count == 0 {
                return Err(unsatisfiable());
            }
            (size.saturating_sub(count), last)
        } else {
            let start = parse_position(start).ok_or_else(unsatisfiable)?;
            let end = if end.is_empty() {
                last
            } else {
                parse_position(end).ok_or_else(unsatisfiable)?.min(last)
            };
            (start, end)
        };

        if start >= size || start > end {
            return Err(unsatisfiable());
        }

        Ok(Self { start, end })
    }

    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this span.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a decimal byte position. Values past `u64::MAX` saturate, so an
/// oversized bound still clamps to the end of the file.
fn parse_position(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.parse().unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(header: &str, size: u64) -> Option<ByteRange> {
        ByteRange::parse(header, size).ok()
    }

    #[test]
    fn test_explicit_range() {
        let range = parse("bytes=10-19", 100).unwrap();
        assert_eq!(range, ByteRange { start: 10, end: 19 });
        assert_eq!(range.content_length(), 10);
        assert_eq!(range.content_range(100), "bytes 10-19/100");
    }

    #[test]
    fn test_multi_digit_bounds_are_split_on_dash() {
        let range = parse("bytes=123-4567", 10_000).unwrap();
        assert_eq!(range, ByteRange { start: 123, end: 4567 });
    }

    #[test]
    fn test_end_clamped_to_size() {
        let range = parse("bytes=50-1000", 100).unwrap();
        assert_eq!(range, ByteRange { start: 50, end: 99 });
        assert_eq!(range.content_range(100), "bytes 50-99/100");
    }

    #[test]
    fn test_oversized_end_clamped_to_size() {
        let range = parse("bytes=50-99999999999999999999999", 100).unwrap();
        assert_eq!(range, ByteRange { start: 50, end: 99 });
        assert_eq!(range.content_length(), 50);
    }

    #[test]
    fn test_oversized_suffix_serves_whole_file() {
        assert_eq!(
            parse("bytes=-99999999999999999999999", 100),
            Some(ByteRange { start: 0, end: 99 })
        );
    }

    #[test]
    fn test_oversized_start_is_unsatisfiable() {
        assert_eq!(parse("bytes=99999999999999999999999-", 100), None);
    }

    #[test]
    fn test_signed_bounds_rejected() {
        assert_eq!(parse("bytes=+5-10", 100), None);
        assert_eq!(parse("bytes=5-+10", 100), None);
    }

    #[test]
    fn test_open_ended_range() {
        assert_eq!(parse("bytes=90-", 100), Some(ByteRange { start: 90, end: 99 }));
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(parse("bytes=-10", 100), Some(ByteRange { start: 90, end: 99 }));
        assert_eq!(parse("bytes=-500", 100), Some(ByteRange { start: 0, end: 99 }));
        assert_eq!(parse("bytes=-0", 100), None);
    }

    #[test]
    fn test_single_byte_range() {
        let range = parse("bytes=0-0", 1).unwrap();
        assert_eq!(range.content_length(), 1);
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert_eq!(parse("bytes=200-300", 100), None);
        assert_eq!(parse("bytes=100-", 100), None);
        assert_eq!(parse("bytes=20-10", 100), None);
        assert_eq!(parse("bytes=0-10", 0), None);
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(parse("bytes=abc-def", 100), None);
        assert_eq!(parse("bytes=0-1,5-6", 100), None);
        assert_eq!(parse("items=0-10", 100), None);
        assert_eq!(parse("bytes 0-10", 100), None);
        assert_eq!(parse("bytes=10", 100), None);
        assert_eq!(parse("bytes=-", 100), None);
    }

    #[test]
    fn test_reports_size() {
        match ByteRange::parse("bytes=500-", 42) {
            Err(ArtifactError::RangeNotSatisfiable { size }) => assert_eq!(size, 42),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
