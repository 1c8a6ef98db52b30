//! Detection configuration.
//!
//! Caller-supplied knobs for the matcher and scorer: the duplicate
//! confidence threshold, per-field scoring weights, and the size band used
//! for near-duplicate file classification.

use crate::{Error, Result};

/// Per-field weights for record similarity scoring.
///
/// Only fields comparable on both sides contribute; their weights are
/// renormalized over the evaluated set, so weights need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWeights {
    /// Weight of the name similarity factor.
    pub name: f64,
    /// Weight of the email similarity factor.
    pub email: f64,
    /// Weight of the phone equality factor.
    pub phone: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        // Equal weighting.
        Self {
            name: 1.0,
            email: 1.0,
            phone: 1.0,
        }
    }
}

/// Configuration for duplicate detection.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `DOPPEL_MATCH_THRESHOLD` | f64 | `0.8` | Minimum aggregate score to classify a record duplicate |
/// | `DOPPEL_SIZE_TOLERANCE` | f64 | `0.05` | Relative size band for near-duplicate files |
/// | `DOPPEL_WEIGHT_NAME` | f64 | `1.0` | Name field weight |
/// | `DOPPEL_WEIGHT_EMAIL` | f64 | `1.0` | Email field weight |
/// | `DOPPEL_WEIGHT_PHONE` | f64 | `1.0` | Phone field weight |
///
/// # Example
///
/// ```rust
/// use doppel::DetectionConfig;
///
/// let config = DetectionConfig::default();
/// assert_eq!(config.match_threshold, 0.8);
/// assert_eq!(config.size_tolerance, 0.05);
/// ```
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Minimum aggregate similarity for a record to be classified duplicate.
    pub match_threshold: f64,
    /// Relative size tolerance for the near-duplicate file band.
    ///
    /// A candidate qualifies when its size lies in the closed interval
    /// `[subject × (1 − tolerance), subject × (1 + tolerance)]`.
    pub size_tolerance: f64,
    /// Per-field weights for record scoring.
    pub field_weights: FieldWeights,
}

impl DetectionConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Falls back to defaults for any unset or unparsable variable.
    #[must_use]
    pub fn from_env() -> Self {
        fn env_f64(key: &str, default: f64) -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            match_threshold: env_f64("DOPPEL_MATCH_THRESHOLD", 0.8),
            size_tolerance: env_f64("DOPPEL_SIZE_TOLERANCE", 0.05),
            field_weights: FieldWeights {
                name: env_f64("DOPPEL_WEIGHT_NAME", 1.0),
                email: env_f64("DOPPEL_WEIGHT_EMAIL", 1.0),
                phone: env_f64("DOPPEL_WEIGHT_PHONE", 1.0),
            },
        }
    }

    /// Builder method to set the match threshold.
    #[must_use]
    pub const fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Builder method to set the size tolerance.
    #[must_use]
    pub const fn with_size_tolerance(mut self, tolerance: f64) -> Self {
        self.size_tolerance = tolerance;
        self
    }

    /// Builder method to set the field weights.
    #[must_use]
    pub const fn with_field_weights(mut self, weights: FieldWeights) -> Self {
        self.field_weights = weights;
        self
    }

    /// Validates the configuration bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the threshold is outside
    /// `[0, 1]`, the size tolerance is outside `[0, 1)`, any weight is
    /// negative, or all weights are zero.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(Error::InvalidInput(format!(
                "match_threshold must be in [0, 1], got {}",
                self.match_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.size_tolerance) {
            return Err(Error::InvalidInput(format!(
                "size_tolerance must be in [0, 1), got {}",
                self.size_tolerance
            )));
        }
        let w = self.field_weights;
        if w.name < 0.0 || w.email < 0.0 || w.phone < 0.0 {
            return Err(Error::InvalidInput(
                "field weights must be non-negative".to_string(),
            ));
        }
        if w.name + w.email + w.phone == 0.0 {
            return Err(Error::InvalidInput(
                "at least one field weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.8,
            size_tolerance: 0.05,
            field_weights: FieldWeights::default(),
        }
    }
}
