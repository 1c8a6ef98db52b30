//! # Doppel
//!
//! Duplicate and near-duplicate detection for file artifacts and contact
//! records.
//!
//! Doppel is the detection core of a data-ingestion pipeline: it fingerprints
//! uploaded content, classifies candidate files against a stored corpus
//! (exact digest, size band, declared-metadata overlap), scores structured
//! contact records by weighted field similarity, and runs the small state
//! machine that governs how a flagged duplicate record is resolved.
//!
//! ## Features
//!
//! - SHA-256 content fingerprinting with a streaming reader variant
//! - File classification by exact digest, ±5% size band, and metadata overlap
//! - Pluggable string similarity (bigram overlap by default) for record scoring
//! - Soft-delete resolution workflow (active → merged | deleted)
//! - Repository traits with in-memory and `SQLite` backends
//!
//! ## Example
//!
//! ```rust,ignore
//! use doppel::{DetectionConfig, ResolutionWorkflow, NewContactRecord};
//! use doppel::storage::InMemoryRecordStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryRecordStore::new());
//! let workflow = ResolutionWorkflow::new(store, DetectionConfig::default());
//!
//! let record = workflow.create(NewContactRecord {
//!     name: Some("John Smith".to_string()),
//!     email: Some("john@x.com".to_string()),
//!     ..Default::default()
//! })?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod fingerprint;
pub mod models;
pub mod services;
pub mod similarity;
pub mod storage;

// Re-exports for convenience
pub use config::{DetectionConfig, FieldWeights};
pub use fingerprint::{ContentDigest, fingerprint, fingerprint_reader};
pub use models::{
    ArtifactId, ArtifactMetadata, ContactRecord, DuplicateAssertion, FileArtifact, MatchBasis,
    NewContactRecord, RecordId, RecordStatus, TemporalRange,
};
pub use services::{
    FileMatchResult, FileMatcher, MatchRequest, RecordScorer, ResolutionWorkflow, UploadDecision,
    UploadOutcome, UploadRequest, UploadService,
};
pub use similarity::{BigramSimilarity, StringSimilarity};
pub use storage::{ArtifactStore, RecordStore};

/// Error type for doppel operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed request parameters, invalid state transitions, unknown ids |
/// | `StoreUnavailable` | Corpus store queries or writes fail (transient, retryable) |
/// | `DigestConflict` | Digest uniqueness violated at persistence time (upload race) |
/// | `Io` | The byte-content source cannot be read during fingerprinting |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A temporal range has `start` after `end`
    /// - A digest string is not 64 lowercase hex characters
    /// - A workflow transition references an unknown record id
    /// - A terminal record (merged/deleted) is asked to transition again
    /// - Configuration values fall outside their documented bounds
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The corpus store could not complete an operation.
    ///
    /// Transient and retryable. Detection never degrades to a partial,
    /// falsely-confident result on store failure; the call fails instead.
    #[error("store unavailable during '{operation}': {cause}")]
    StoreUnavailable {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Digest uniqueness was violated at persistence time.
    ///
    /// Two concurrent uploads with identical content can both observe
    /// "no exact match" before either is persisted; the store rejects the
    /// second insert and this error surfaces the race to the caller.
    #[error("artifact with digest {digest} already exists")]
    DigestConflict {
        /// The conflicting content digest (hex).
        digest: String,
    },

    /// The byte-content source could not be read.
    #[error("content source read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for doppel operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad range".to_string());
        assert_eq!(err.to_string(), "invalid input: bad range");

        let err = Error::StoreUnavailable {
            operation: "find_by_digest".to_string(),
            cause: "connection lost".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store unavailable during 'find_by_digest': connection lost"
        );

        let err = Error::DigestConflict {
            digest: "ab".repeat(32),
        };
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err = Error::from(io);
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("truncated"));
    }
}
