//! File similarity matcher.
//!
//! Classifies a candidate file against the stored corpus on three bases:
//!
//! 1. **Exact**: identical content digest. Dominates everything else, so
//!    size similarity is short-circuited when an exact match exists.
//! 2. **Size**: digest differs but size lies within the configured band
//!    (±5% by default), evaluated only when no exact match was found.
//! 3. **Metadata**: overlapping declared temporal range and/or exactly
//!    matching spatial domain. Evaluated independently of the other two.
//!
//! The same artifact may legitimately appear under more than one basis.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use crate::Result;
use crate::config::DetectionConfig;
use crate::fingerprint::ContentDigest;
use crate::models::{ArtifactMetadata, DuplicateAssertion, FileArtifact, MatchBasis};
use crate::storage::ArtifactStore;

/// A candidate file to classify: digest, declared size, and optional
/// declared metadata. The raw bytes never reach the matcher.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    /// Content digest of the candidate.
    pub digest: ContentDigest,
    /// Declared size in bytes.
    pub size_bytes: u64,
    /// Declared media type, if any.
    pub content_type: Option<String>,
    /// Declared descriptive metadata.
    pub metadata: ArtifactMetadata,
}

/// Caller-level decision derived from a match result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadDecision {
    /// An exact duplicate exists: reject unless explicitly overridden.
    Reject,
    /// Near-duplicates exist: proceed, but flag to the uploader.
    Flag,
    /// No findings: proceed.
    Accept,
}

/// Union of all findings for a candidate file, tagged by basis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMatchResult {
    /// Artifacts with an identical content digest.
    pub exact: Vec<FileArtifact>,
    /// Artifacts within the size band (empty when `exact` is non-empty).
    pub similar_by_size: Vec<FileArtifact>,
    /// Artifacts with overlapping/matching declared metadata.
    pub similar_by_metadata: Vec<FileArtifact>,
}

impl FileMatchResult {
    /// Whether any finding exists on any basis.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        !self.exact.is_empty()
            || !self.similar_by_size.is_empty()
            || !self.similar_by_metadata.is_empty()
    }

    /// Derives the upload decision: exact ⇒ reject, similar ⇒ flag,
    /// nothing ⇒ accept.
    #[must_use]
    pub fn decision(&self) -> UploadDecision {
        if !self.exact.is_empty() {
            UploadDecision::Reject
        } else if self.has_findings() {
            UploadDecision::Flag
        } else {
            UploadDecision::Accept
        }
    }

    /// Flattens the result into transient duplicate assertions.
    ///
    /// `subject_id` identifies the candidate under evaluation (it may not
    /// be persisted yet). Exact findings carry score 1.0; similarity
    /// findings carry the ranking score against the given request.
    #[must_use]
    pub fn assertions(&self, subject_id: &str, request: &MatchRequest) -> Vec<DuplicateAssertion> {
        let mut out = Vec::new();
        for artifact in &self.exact {
            out.push(DuplicateAssertion {
                subject_id: subject_id.to_string(),
                candidate_id: artifact.id.as_str().to_string(),
                score: 1.0,
                basis: MatchBasis::ExactHash,
            });
        }
        for artifact in &self.similar_by_size {
            out.push(DuplicateAssertion {
                subject_id: subject_id.to_string(),
                candidate_id: artifact.id.as_str().to_string(),
                score: similarity_score(request, artifact),
                basis: MatchBasis::SizeRange,
            });
        }
        for artifact in &self.similar_by_metadata {
            out.push(DuplicateAssertion {
                subject_id: subject_id.to_string(),
                candidate_id: artifact.id.as_str().to_string(),
                score: similarity_score(request, artifact),
                basis: MatchBasis::MetadataOverlap,
            });
        }
        out
    }
}

/// Optional ranking score between a candidate file and a stored artifact.
///
/// Arithmetic mean over only the factors evaluable on both sides:
/// size proximity (`1 − relative size delta`, floored at zero), media-type
/// equality, temporal overlap, and spatial match. A factor missing on
/// either side is excluded from numerator and denominator, never counted
/// as zero. No evaluable factor yields 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity_score(request: &MatchRequest, artifact: &FileArtifact) -> f64 {
    let mut factors: Vec<f64> = Vec::with_capacity(4);

    // Size is always declared on both sides.
    if request.size_bytes == 0 && artifact.size_bytes == 0 {
        factors.push(1.0);
    } else {
        let subject = request.size_bytes.max(1) as f64;
        let delta = (artifact.size_bytes as f64 - request.size_bytes as f64).abs() / subject;
        factors.push((1.0 - delta).max(0.0));
    }

    if let (Some(a), Some(b)) = (&request.content_type, &artifact.content_type) {
        factors.push(if a == b { 1.0 } else { 0.0 });
    }

    if let (Some(a), Some(b)) = (
        &request.metadata.temporal_range,
        &artifact.metadata.temporal_range,
    ) {
        factors.push(if a.overlaps(b) { 1.0 } else { 0.0 });
    }

    if let (Some(a), Some(b)) = (
        &request.metadata.spatial_domain,
        &artifact.metadata.spatial_domain,
    ) {
        factors.push(if a == b { 1.0 } else { 0.0 });
    }

    if factors.is_empty() {
        return 0.0;
    }
    factors.iter().sum::<f64>() / factors.len() as f64
}

/// File similarity matcher over an injected artifact store.
pub struct FileMatcher<S: ArtifactStore> {
    store: Arc<S>,
    config: DetectionConfig,
}

impl<S: ArtifactStore> FileMatcher<S> {
    /// Creates a matcher over the given store.
    #[must_use]
    pub const fn new(store: Arc<S>, config: DetectionConfig) -> Self {
        Self { store, config }
    }

    /// Computes the closed size band `[min, max]` for a subject size.
    ///
    /// Bounds are rounded inward (ceil for the lower bound, floor for the
    /// upper) so the integer interval matches the real-valued closed
    /// interval exactly.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn size_band(&self, size_bytes: u64) -> (u64, u64) {
        let size = size_bytes as f64;
        let min = (size * (1.0 - self.config.size_tolerance)).ceil() as u64;
        let max = (size * (1.0 + self.config.size_tolerance)).floor() as u64;
        (min, max)
    }

    /// Classifies a candidate file against the corpus.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::StoreUnavailable`] from the corpus store:
    /// detection fails rather than returning a partial classification.
    #[instrument(
        skip(self, request),
        fields(
            operation = "match_file",
            digest = %request.digest,
            size_bytes = request.size_bytes
        )
    )]
    pub fn match_file(&self, request: &MatchRequest) -> Result<FileMatchResult> {
        let exact = self.store.find_by_digest(&request.digest)?;

        // Exact dominates: the size scan is skipped entirely when the very
        // same content is already stored.
        let similar_by_size = if exact.is_empty() {
            let (min, max) = self.size_band(request.size_bytes);
            self.store
                .find_by_size_range(min, max)?
                .into_iter()
                .filter(|a| a.content_digest != request.digest)
                .collect()
        } else {
            tracing::debug!(
                matches = exact.len(),
                "exact digest match, skipping size scan"
            );
            Vec::new()
        };

        // Metadata similarity is evaluated independently of the other bases.
        let similar_by_metadata = if request.metadata.is_empty() {
            Vec::new()
        } else {
            self.store.find_by_metadata(
                request.metadata.temporal_range.as_ref(),
                request.metadata.spatial_domain.as_deref(),
            )?
        };

        let result = FileMatchResult {
            exact,
            similar_by_size,
            similar_by_metadata,
        };

        let decision = result.decision();
        tracing::debug!(
            exact = result.exact.len(),
            by_size = result.similar_by_size.len(),
            by_metadata = result.similar_by_metadata.len(),
            decision = ?decision,
            "file classification complete"
        );
        metrics::counter!(
            "doppel_file_matches_total",
            "decision" => match decision {
                UploadDecision::Reject => "reject",
                UploadDecision::Flag => "flag",
                UploadDecision::Accept => "accept",
            }
        )
        .increment(1);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::models::{ArtifactId, TemporalRange};
    use crate::storage::InMemoryArtifactStore;
    use chrono::{NaiveDate, Utc};

    fn artifact(id: &str, content: &[u8], size: u64) -> FileArtifact {
        FileArtifact {
            id: ArtifactId::new(id),
            content_digest: fingerprint(content),
            size_bytes: size,
            file_name: None,
            content_type: None,
            metadata: ArtifactMetadata::default(),
            owner: "tester".to_string(),
            download_count: 0,
            created_at: Utc::now(),
        }
    }

    fn request(content: &[u8], size: u64) -> MatchRequest {
        MatchRequest {
            digest: fingerprint(content),
            size_bytes: size,
            content_type: None,
            metadata: ArtifactMetadata::default(),
        }
    }

    fn matcher(store: Arc<InMemoryArtifactStore>) -> FileMatcher<InMemoryArtifactStore> {
        FileMatcher::new(store, DetectionConfig::default())
    }

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> TemporalRange {
        TemporalRange::from_dates(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_exact_match_short_circuits_size_scan() {
        let store = Arc::new(InMemoryArtifactStore::new());
        store.insert(&artifact("a", b"same content", 1000)).unwrap();
        // A second artifact inside the size band that must NOT be reported.
        store.insert(&artifact("b", b"other content", 1000)).unwrap();

        let result = matcher(store)
            .match_file(&request(b"same content", 1000))
            .unwrap();

        assert_eq!(result.exact.len(), 1);
        assert_eq!(result.exact[0].id.as_str(), "a");
        assert!(result.similar_by_size.is_empty());
        assert_eq!(result.decision(), UploadDecision::Reject);
    }

    #[test]
    fn test_size_band_boundaries_are_closed() {
        let store = Arc::new(InMemoryArtifactStore::new());
        store.insert(&artifact("at-low", b"c1", 9500)).unwrap();
        store.insert(&artifact("below-low", b"c2", 9499)).unwrap();
        store.insert(&artifact("at-high", b"c3", 10500)).unwrap();
        store.insert(&artifact("above-high", b"c4", 10501)).unwrap();

        let result = matcher(store)
            .match_file(&request(b"subject", 10000))
            .unwrap();

        let ids: Vec<&str> = result
            .similar_by_size
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["at-high", "at-low"]);
        assert_eq!(result.decision(), UploadDecision::Flag);
    }

    #[test]
    fn test_size_band_computation() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let m = matcher(store);
        assert_eq!(m.size_band(1000), (950, 1050));
        assert_eq!(m.size_band(10000), (9500, 10500));
        // 3% above 1000 is inside, 5.01% is outside.
        let (min, max) = m.size_band(1000);
        assert!((min..=max).contains(&1030));
        assert!(!(min..=max).contains(&1051));
    }

    #[test]
    fn test_no_findings_accepts() {
        let store = Arc::new(InMemoryArtifactStore::new());
        store.insert(&artifact("far", b"far away", 5000)).unwrap();

        let result = matcher(store)
            .match_file(&request(b"subject", 1000))
            .unwrap();
        assert!(!result.has_findings());
        assert_eq!(result.decision(), UploadDecision::Accept);
    }

    #[test]
    fn test_metadata_similarity_evaluated_alongside_exact() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut stored = artifact("meta", b"stored content", 400);
        stored.metadata = ArtifactMetadata {
            temporal_range: Some(range((2024, 1, 1), (2024, 3, 31))),
            spatial_domain: None,
        };
        store.insert(&stored).unwrap();
        store.insert(&artifact("same", b"subject bytes", 99)).unwrap();

        let mut req = request(b"subject bytes", 99);
        req.metadata.temporal_range = Some(range((2024, 3, 1), (2024, 4, 30)));

        let result = matcher(store).match_file(&req).unwrap();
        // Exact match found AND metadata similarity still evaluated.
        assert_eq!(result.exact.len(), 1);
        assert_eq!(result.similar_by_metadata.len(), 1);
        assert_eq!(result.similar_by_metadata[0].id.as_str(), "meta");
    }

    #[test]
    fn test_artifact_can_appear_under_multiple_bases() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mut stored = artifact("dual", b"stored", 1000);
        stored.metadata.spatial_domain = Some("zone-1".to_string());
        store.insert(&stored).unwrap();

        let mut req = request(b"candidate", 1000);
        req.metadata.spatial_domain = Some("zone-1".to_string());

        let result = matcher(store).match_file(&req).unwrap();
        assert_eq!(result.similar_by_size.len(), 1);
        assert_eq!(result.similar_by_metadata.len(), 1);
        assert_eq!(
            result.similar_by_size[0].id,
            result.similar_by_metadata[0].id
        );
    }

    #[test]
    fn test_similarity_score_excludes_missing_factors() {
        let req = request(b"x", 1000);
        let candidate = artifact("c", b"y", 1000);
        // Only size is evaluable: identical sizes score 1.0.
        assert!((similarity_score(&req, &candidate) - 1.0).abs() < f64::EPSILON);

        // Adding a mismatched content type on both sides halves the mean.
        let mut req2 = req.clone();
        req2.content_type = Some("text/csv".to_string());
        let mut candidate2 = candidate.clone();
        candidate2.content_type = Some("application/json".to_string());
        assert!((similarity_score(&req2, &candidate2) - 0.5).abs() < f64::EPSILON);

        // A type present on one side only is excluded, not counted as zero.
        let mut candidate3 = candidate;
        candidate3.content_type = None;
        assert!((similarity_score(&req2, &candidate3) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_score_size_proximity() {
        let req = request(b"x", 1000);
        let candidate = artifact("c", b"y", 1030);
        let score = similarity_score(&req, &candidate);
        assert!((score - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_assertions_carry_bases() {
        let store = Arc::new(InMemoryArtifactStore::new());
        store.insert(&artifact("near", b"near", 1000)).unwrap();

        let req = request(b"candidate", 1000);
        let result = matcher(store).match_file(&req).unwrap();
        let assertions = result.assertions("upload-1", &req);

        assert_eq!(assertions.len(), 1);
        assert_eq!(assertions[0].basis, MatchBasis::SizeRange);
        assert_eq!(assertions[0].subject_id, "upload-1");
        assert_eq!(assertions[0].candidate_id, "near");
    }
}
