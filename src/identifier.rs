//! Mapping from a Bilibili video id to an Internet Archive item identifier.
//!
//! Archive identifiers are case-insensitive, while `BV` ids are not. The
//! identifier therefore carries a fingerprint of where the uppercase letters
//! sit in the id, e.g. `BiliBili-BV1HP411D7Rj_p1-1R1D3PH1VB`.

use std::fmt;

use serde::Serialize;

use crate::video::VideoReference;

/// Namespace prefix shared by every item the archiver uploads.
pub const NAMESPACE: &str = "BiliBili";

/// Which end of the id the fingerprint scan starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Scan from the first character. Produces something that looks like a `BV` id.
    Forward,
    /// Scan from the last character. This is what identifiers use, so the
    /// fingerprint does not pollute full-text search with a fake id.
    Backward,
}

/// Record the positions of all ASCII uppercase letters in `input`.
///
/// Each uppercase letter is emitted as-is, preceded by the number of
/// characters skipped since the previous uppercase letter when that number is
/// non-zero.
pub fn fingerprint(input: &str, direction: Direction) -> String {
    let chars: Vec<char> = match direction {
        Direction::Forward => input.chars().collect(),
        Direction::Backward => input.chars().rev().collect(),
    };

    let mut result = String::new();
    let mut steps: usize = 0;
    for c in chars {
        if c.is_ascii_uppercase() {
            if steps > 0 {
                result.push_str(&steps.to_string());
            }
            result.push(c);
            steps = 0;
        } else {
            steps += 1;
        }
    }
    result
}

/// Backward-scan fingerprint, the form used in archive identifiers.
pub fn upper_case_fingerprint(input: &str) -> String {
    fingerprint(input, Direction::Backward)
}

/// An Internet Archive item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ArchiveIdentifier(String);

impl ArchiveIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArchiveIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode `canonical_id` and `page_index` under the default namespace.
pub fn encode(canonical_id: &str, page_index: u32) -> ArchiveIdentifier {
    encode_with_namespace(NAMESPACE, canonical_id, page_index)
}

pub fn encode_with_namespace(
    namespace: &str,
    canonical_id: &str,
    page_index: u32,
) -> ArchiveIdentifier {
    ArchiveIdentifier(format!(
        "{}-{}_p{}-{}",
        namespace,
        canonical_id,
        page_index,
        upper_case_fingerprint(canonical_id)
    ))
}

/// Identifier codec bound to a configured namespace.
#[derive(Debug, Clone)]
pub struct IdentifierCodec {
    namespace: String,
}

impl Default for IdentifierCodec {
    fn default() -> Self {
        Self::new(NAMESPACE)
    }
}

impl IdentifierCodec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Encode a resolved reference. `reference.raw_id` must already be canonical.
    pub fn encode(&self, reference: &VideoReference) -> ArchiveIdentifier {
        encode_with_namespace(&self.namespace, &reference.raw_id, reference.page_index)
    }
}
