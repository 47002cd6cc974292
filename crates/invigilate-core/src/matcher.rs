//! Incremental prefix matching for one output stream.
//!
//! The engine appends whatever the child has written so far to a per-stream
//! actual-bytes buffer and asks, for the pending expect directive, whether
//! the buffer already matches the expected bytes, already contradicts them,
//! or merely has not caught up yet. Pipe reads happen only in the last
//! case. Matched bytes are drained from the front of the buffer and any
//! residue stays behind for the next directive of the same stream, so a
//! single child write may straddle several consecutive directives.

use bstr::{BStr, ByteSlice};

/// Verdict of comparing the pending expected bytes with the actual buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStep {
    /// The actual buffer starts with the expected bytes.
    Matched,
    /// Some overlapping byte differs; the stream has diverged.
    Diverged,
    /// The actual buffer is a strict prefix of the expected bytes; no
    /// verdict is possible until more data (or end of stream) arrives.
    NeedMore,
}

/// Compare `want` against the front of `actual` without consuming either.
#[must_use]
pub fn step(want: &[u8], actual: &[u8]) -> MatchStep {
    let overlap = want.len().min(actual.len());
    if want[..overlap] != actual[..overlap] {
        return MatchStep::Diverged;
    }
    if actual.len() >= want.len() {
        MatchStep::Matched
    } else {
        MatchStep::NeedMore
    }
}

/// The first line of `bytes`, up to and including the first `\n`, or all of
/// it when there is none. Divergence reports quote only this much of the
/// actual output.
#[must_use]
pub fn first_line(bytes: &[u8]) -> &BStr {
    match bytes.find_byte(b'\n') {
        Some(n) => bytes[..=n].as_bstr(),
        None => bytes.as_bstr(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_requires_full_expected_length() {
        assert_eq!(step(b"alpha", b"alpha"), MatchStep::Matched);
        assert_eq!(step(b"alpha", b"alphabeta\n"), MatchStep::Matched);
        assert_eq!(step(b"alpha", b"alp"), MatchStep::NeedMore);
    }

    #[test]
    fn test_single_write_straddles_two_directives() {
        // One child write of "alphabeta\n" satisfies ">alpha" then ">beta\n".
        let mut actual = b"alphabeta\n".to_vec();
        assert_eq!(step(b"alpha", &actual), MatchStep::Matched);
        actual.drain(..5);
        assert_eq!(step(b"beta\n", &actual), MatchStep::Matched);
        actual.drain(..5);
        assert!(actual.is_empty());
    }

    #[test]
    fn test_diverges_on_first_differing_byte() {
        assert_eq!(step(b"right", b"wrong"), MatchStep::Diverged);
        // A divergence inside the overlap is final even though the actual
        // buffer is still shorter than the expected bytes.
        assert_eq!(step(b"Bobolink", b"Box"), MatchStep::Diverged);
    }

    #[test]
    fn test_strict_prefix_needs_more() {
        assert_eq!(step(b"Bobolink", b"Bob"), MatchStep::NeedMore);
        assert_eq!(step(b"x", b""), MatchStep::NeedMore);
    }

    #[test]
    fn test_empty_want_matches_anything() {
        assert_eq!(step(b"", b""), MatchStep::Matched);
        assert_eq!(step(b"", b"leftover"), MatchStep::Matched);
    }

    #[test]
    fn test_first_line_stops_after_newline() {
        assert_eq!(first_line(b"wrong\nmore\n").as_bytes(), b"wrong\n");
        assert_eq!(first_line(b"no newline").as_bytes(), b"no newline");
        assert_eq!(first_line(b"").as_bytes(), b"");
    }
}
