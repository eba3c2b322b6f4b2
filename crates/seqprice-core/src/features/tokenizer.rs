//! Sequence feature extraction: token, mask and track-marker counts.
//!
//! Tokenization is best-effort. A token is either a bracketed special marker
//! (`<mask>`, `<cls>`, `<pad>`, `<unk>`, ...) or one residue from the
//! amino-acid alphabet. Everything else is skipped without error.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use regex::Regex;
use std::sync::LazyLock;

/// Residues counted as tokens, matched case-insensitively.
pub const RESIDUE_ALPHABET: &str = "ACDEFGHIKLMNPQRSTVWY";

/// Literal marker for a masked position.
pub const MASK_TOKEN: &str = "<mask>";

/// Literal marker counted by the legacy tracks rule.
pub const TRACK_MARKER: &str = "TRACK";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>|(?i-u:[ACDEFGHIKLMNPQRSTVWY])").unwrap());

static MASK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i-u:<mask>)").unwrap());

#[cfg_attr(feature = "python", pyfunction)]
pub fn count_tokens(sequence: &str) -> usize {
    if sequence.is_empty() {
        return 0;
    }
    TOKEN_RE.find_iter(sequence).count()
}

/// Count `<mask>` markers. `<mask>` also matches the bracketed-marker arm of
/// [`count_tokens`], so this is a separate scan.
#[cfg_attr(feature = "python", pyfunction)]
pub fn count_masked_tokens(sequence: &str) -> usize {
    MASK_RE.find_iter(sequence).count()
}

#[cfg_attr(feature = "python", pyfunction)]
pub fn count_track_markers(sequence: &str) -> usize {
    sequence.matches(TRACK_MARKER).count()
}

/// Length in characters, not bytes.
pub fn sequence_length(sequence: &str) -> usize {
    sequence.chars().count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
