//! Duplicate assertions.
//!
//! A [`DuplicateAssertion`] is the transient output of a matcher or scorer
//! call: subject, candidate, score, and the basis on which the candidate was
//! flagged. Assertions are never persisted; callers decide what to do with
//! them (block, warn, or record advisory metadata).

use serde::{Deserialize, Serialize};

/// The basis on which a candidate was asserted to be a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchBasis {
    /// Identical content digest.
    ExactHash,
    /// Size within the configured band of the subject's size.
    SizeRange,
    /// Overlapping temporal range and/or matching spatial domain.
    MetadataOverlap,
    /// Weighted field-similarity score over promoted record fields.
    FieldSimilarity,
}

impl std::fmt::Display for MatchBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactHash => write!(f, "exact-hash"),
            Self::SizeRange => write!(f, "size-range"),
            Self::MetadataOverlap => write!(f, "metadata-overlap"),
            Self::FieldSimilarity => write!(f, "field-similarity"),
        }
    }
}

/// A single duplicate finding: (subject, candidate, score, basis).
///
/// Transient by design. `subject_id` identifies the entity being ingested
/// (which may not be persisted yet), `candidate_id` the stored entity it was
/// compared against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateAssertion {
    /// Identifier of the subject under evaluation.
    pub subject_id: String,
    /// Identifier of the stored candidate.
    pub candidate_id: String,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
    /// The basis for the assertion.
    pub basis: MatchBasis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_display_matches_wire_form() {
        assert_eq!(MatchBasis::ExactHash.to_string(), "exact-hash");
        assert_eq!(MatchBasis::SizeRange.to_string(), "size-range");
        assert_eq!(MatchBasis::MetadataOverlap.to_string(), "metadata-overlap");
        assert_eq!(MatchBasis::FieldSimilarity.to_string(), "field-similarity");
    }

    #[test]
    fn test_basis_serde_uses_kebab_case() {
        let json = serde_json::to_string(&MatchBasis::MetadataOverlap).unwrap();
        assert_eq!(json, "\"metadata-overlap\"");
    }
}
