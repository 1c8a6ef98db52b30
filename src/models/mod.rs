//! Data models for doppel.
//!
//! This module contains the core entities the detection engine reads and
//! writes: file artifacts, contact records, and the transient duplicate
//! assertions produced by matcher/scorer calls.

mod artifact;
mod assertion;
mod record;

pub use artifact::{ArtifactId, ArtifactMetadata, FileArtifact, TemporalRange};
pub use assertion::{DuplicateAssertion, MatchBasis};
pub use record::{ContactRecord, NewContactRecord, RecordId, RecordStatus};
