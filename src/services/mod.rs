//! Detection services.
//!
//! The three engine components plus the upload orchestrator:
//!
//! 1. **File Similarity Matcher**: classifies a candidate file against the
//!    stored corpus (exact digest, ±5% size band, metadata overlap).
//! 2. **Record Similarity Scorer**: weighted field similarity over the
//!    promoted contact fields, ranked and thresholded.
//! 3. **Duplicate Resolution Workflow**: the active → merged | deleted
//!    state machine for flagged contact records.
//! 4. **Upload Service**: fingerprint → match → decision → persist, with
//!    the digest-uniqueness race surfaced rather than swallowed.

mod matcher;
mod scorer;
mod upload;
mod workflow;

pub use matcher::{FileMatchResult, FileMatcher, MatchRequest, UploadDecision, similarity_score};
pub use scorer::RecordScorer;
pub use upload::{UploadOutcome, UploadRequest, UploadService};
pub use workflow::ResolutionWorkflow;
