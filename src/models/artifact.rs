//! File artifact types and identifiers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fingerprint::ContentDigest;
use crate::{Error, Result};

/// Unique identifier for a file artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Creates a new artifact ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random (UUID v4) artifact ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An inclusive temporal interval attached to an artifact's metadata.
///
/// Overlap tests are closed on both ends: two ranges overlap when
/// `self.start <= other.end && other.start <= self.end`. Date-only values
/// are widened to start-of-day / end-of-day at construction so a range
/// declared as a pair of dates covers every instant of both days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalRange {
    /// Inclusive start of the range.
    pub start: DateTime<Utc>,
    /// Inclusive end of the range.
    pub end: DateTime<Utc>,
}

impl TemporalRange {
    /// Creates a range from explicit instants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!(
                "temporal range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Creates a range from date-only values, widened to full-day bounds.
    ///
    /// The start becomes `00:00:00` of `start` and the end becomes the last
    /// representable instant before midnight of the day after `end`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `start` is after `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!(
                "temporal range start {start} is after end {end}"
            )));
        }
        let widened_start = start.and_time(chrono::NaiveTime::MIN).and_utc();
        let widened_end = end
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_else(|| end.and_time(chrono::NaiveTime::MIN))
            .and_utc();
        Ok(Self {
            start: widened_start,
            end: widened_end,
        })
    }

    /// Inclusive interval-overlap test.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Descriptive metadata declared at upload time.
///
/// Both fields are optional; similarity queries only evaluate the criteria
/// the subject actually supplies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Declared temporal coverage of the content.
    pub temporal_range: Option<TemporalRange>,
    /// Declared spatial domain (compared by exact string equality).
    pub spatial_domain: Option<String>,
}

impl ArtifactMetadata {
    /// Whether any similarity criterion is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.temporal_range.is_none() && self.spatial_domain.is_none()
    }
}

/// A stored file artifact.
///
/// Created once on upload and immutable thereafter, except
/// `download_count` which the store increments on each download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileArtifact {
    /// Unique identifier.
    pub id: ArtifactId,
    /// Content digest (pure function of byte content).
    pub content_digest: ContentDigest,
    /// Declared size of the content in bytes.
    pub size_bytes: u64,
    /// Original file name, if the byte source declared one.
    pub file_name: Option<String>,
    /// Declared media type (e.g. `text/csv`).
    pub content_type: Option<String>,
    /// Descriptive metadata used for near-duplicate classification.
    pub metadata: ArtifactMetadata,
    /// Owner of the upload.
    pub owner: String,
    /// Number of times the artifact has been downloaded.
    pub download_count: u64,
    /// Upload timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let range = TemporalRange::from_dates(date(2024, 6, 1), date(2024, 5, 1));
        assert!(range.is_err());
    }

    #[test]
    fn test_date_widening_covers_full_days() {
        let range = TemporalRange::from_dates(date(2024, 3, 10), date(2024, 3, 10)).unwrap();
        assert_eq!(range.start.to_rfc3339(), "2024-03-10T00:00:00+00:00");
        assert!(range.end > range.start);
        assert_eq!(range.end.date_naive(), date(2024, 3, 10));
    }

    #[test]
    fn test_overlap_is_inclusive_at_shared_day() {
        // Ranges that merely touch on a single day still overlap.
        let a = TemporalRange::from_dates(date(2024, 1, 1), date(2024, 1, 10)).unwrap();
        let b = TemporalRange::from_dates(date(2024, 1, 10), date(2024, 1, 20)).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_disjoint_ranges_do_not_overlap() {
        let a = TemporalRange::from_dates(date(2024, 1, 1), date(2024, 1, 9)).unwrap();
        let b = TemporalRange::from_dates(date(2024, 1, 10), date(2024, 1, 20)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_contained_range_overlaps() {
        let outer = TemporalRange::from_dates(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        let inner = TemporalRange::from_dates(date(2024, 6, 1), date(2024, 6, 30)).unwrap();
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn test_metadata_is_empty() {
        assert!(ArtifactMetadata::default().is_empty());
        let with_spatial = ArtifactMetadata {
            spatial_domain: Some("pacific-northwest".to_string()),
            ..Default::default()
        };
        assert!(!with_spatial.is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ArtifactId::generate(), ArtifactId::generate());
    }
}
