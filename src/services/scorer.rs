//! Record similarity scorer.
//!
//! Computes a weighted aggregate similarity between a subject contact record
//! and a set of active candidates. Only the three promoted fields (name,
//! email, phone) participate; a field missing or malformed on either side is
//! excluded from both numerator and denominator rather than counted as zero.

use tracing::instrument;

use crate::Result;
use crate::config::DetectionConfig;
use crate::models::{ContactRecord, DuplicateAssertion, MatchBasis, RecordStatus};
use crate::similarity::{BigramSimilarity, StringSimilarity, normalize_field, normalize_phone};

/// Record similarity scorer with a pluggable string-similarity function.
pub struct RecordScorer {
    similarity: Box<dyn StringSimilarity>,
    config: DetectionConfig,
}

impl RecordScorer {
    /// Creates a scorer with the default bigram similarity.
    #[must_use]
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            similarity: Box::new(BigramSimilarity),
            config,
        }
    }

    /// Creates a scorer with a caller-supplied similarity function.
    #[must_use]
    pub fn with_similarity(config: DetectionConfig, similarity: Box<dyn StringSimilarity>) -> Self {
        Self { similarity, config }
    }

    /// Computes the aggregate similarity between two records.
    ///
    /// Weighted arithmetic mean over the fields evaluable on both sides
    /// (weights from the configuration, renormalized over the evaluated
    /// set). Returns 0 when no field is comparable — a wholly empty subject
    /// legitimately scores 0 against everything.
    #[must_use]
    pub fn aggregate(&self, subject: &ContactRecord, candidate: &ContactRecord) -> f64 {
        let weights = self.config.field_weights;
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        if let Some((a, b)) = comparable(subject.name.as_deref(), candidate.name.as_deref()) {
            weighted_sum += weights.name * self.similarity.score(&a, &b);
            weight_total += weights.name;
        }
        if let Some((a, b)) = comparable(subject.email.as_deref(), candidate.email.as_deref()) {
            weighted_sum += weights.email * self.similarity.score(&a, &b);
            weight_total += weights.email;
        }
        if let Some((a, b)) = comparable_phones(subject.phone.as_deref(), candidate.phone.as_deref())
        {
            weighted_sum += weights.phone * f64::from(u8::from(a == b));
            weight_total += weights.phone;
        }

        if weight_total == 0.0 {
            0.0
        } else {
            weighted_sum / weight_total
        }
    }

    /// Scores a subject against a candidate set and ranks the duplicates.
    ///
    /// Candidates that are not active, or that share the subject's id, are
    /// skipped. Only candidates whose aggregate reaches `threshold` (the
    /// configured threshold when `None`) are returned, sorted by score
    /// descending with ties broken by candidate id ascending so identical
    /// inputs always produce identical output.
    ///
    /// # Errors
    ///
    /// Currently infallible over an in-memory candidate set; the `Result`
    /// keeps the signature stable for callers that obtain candidates from
    /// a store in the same call path.
    #[instrument(
        skip(self, subject, candidates),
        fields(
            operation = "score_record",
            subject_id = %subject.id,
            candidate_count = candidates.len()
        )
    )]
    pub fn score(
        &self,
        subject: &ContactRecord,
        candidates: &[ContactRecord],
        threshold: Option<f64>,
    ) -> Result<Vec<DuplicateAssertion>> {
        let threshold = threshold.unwrap_or(self.config.match_threshold);

        let mut assertions: Vec<DuplicateAssertion> = candidates
            .iter()
            .filter(|c| c.status == RecordStatus::Active && c.id != subject.id)
            .map(|candidate| DuplicateAssertion {
                subject_id: subject.id.as_str().to_string(),
                candidate_id: candidate.id.as_str().to_string(),
                score: self.aggregate(subject, candidate),
                basis: MatchBasis::FieldSimilarity,
            })
            .filter(|assertion| assertion.score >= threshold)
            .collect();

        assertions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });

        tracing::debug!(
            duplicates = assertions.len(),
            threshold = threshold,
            "record scoring complete"
        );
        metrics::counter!("doppel_record_scores_total").increment(1);
        if !assertions.is_empty() {
            metrics::counter!("doppel_record_duplicates_total").increment(assertions.len() as u64);
        }

        Ok(assertions)
    }
}

/// Normalizes both sides of a field; `None` unless both normalize to
/// something non-empty. Malformation (normalizing to empty) degrades the
/// field to "not comparable" instead of aborting the comparison.
fn comparable(subject: Option<&str>, candidate: Option<&str>) -> Option<(String, String)> {
    let a = normalize_field(subject?);
    let b = normalize_field(candidate?);
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some((a, b))
}

fn comparable_phones(subject: Option<&str>, candidate: Option<&str>) -> Option<(String, String)> {
    let a = normalize_phone(subject?);
    let b = normalize_phone(candidate?);
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some((a, b))
}
