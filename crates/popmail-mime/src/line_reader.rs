//! Byte-oriented line reading.
//!
//! Raw mail is not guaranteed to be valid in any text encoding, so lines are
//! handed out as byte slices borrowed from the input.

/// Iterator over the lines of a byte buffer.
///
/// Lines end at `\n`; a `\r` directly before it is stripped as well. A final
/// line without terminator is still yielded.
#[derive(Debug, Clone)]
pub struct LineReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LineReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Byte offset of the first byte not yet consumed.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Everything not yet consumed.
    #[must_use]
    pub fn remainder(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Reads the next line, returning it together with the offset it started at.
    pub fn next_with_offset(&mut self) -> Option<(usize, &'a [u8])> {
        let start = self.pos;
        self.next().map(|line| (start, line))
    }
}

impl<'a> Iterator for LineReader<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }

        let rest = &self.data[self.pos..];
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => (&rest[..nl], nl + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;

        Some(line.strip_suffix(b"\r").unwrap_or(line))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_and_lf_lines() {
        let lines: Vec<&[u8]> = LineReader::new(b"one\r\ntwo\nthree").collect();
        assert_eq!(lines, vec![&b"one"[..], b"two", b"three"]);
    }

    #[test]
    fn test_empty_lines_are_yielded() {
        let lines: Vec<&[u8]> = LineReader::new(b"a\r\n\r\nb\r\n").collect();
        assert_eq!(lines, vec![&b"a"[..], b"", b"b"]);
    }

    #[test]
    fn test_position_tracks_terminators() {
        let mut reader = LineReader::new(b"ab\r\ncd\n");
        reader.next();
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.remainder(), b"cd\n");
        assert_eq!(reader.next_with_offset(), Some((4, &b"cd"[..])));
        assert_eq!(reader.next(), None);
    }

    #[test]
    fn test_non_utf8_bytes_pass_through() {
        let lines: Vec<&[u8]> = LineReader::new(b"\xff\xfe\r\n").collect();
        assert_eq!(lines, vec![&b"\xff\xfe"[..]]);
    }
}
