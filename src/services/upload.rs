//! Upload ingestion orchestrator.
//!
//! Ties the fingerprinter, matcher, and artifact store into the upload
//! control flow: fingerprint the bytes, classify against the corpus, derive
//! the decision, and persist when the decision allows. An exact duplicate
//! blocks the upload unless the caller explicitly overrides; near-duplicates
//! proceed but are flagged in the outcome.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

use crate::Result;
use crate::config::DetectionConfig;
use crate::models::{ArtifactId, ArtifactMetadata, FileArtifact};
use crate::services::matcher::{FileMatchResult, FileMatcher, MatchRequest, UploadDecision};
use crate::storage::ArtifactStore;

/// An upload to ingest: raw bytes plus declared attributes from the
/// byte-content source.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Raw byte content.
    pub content: Vec<u8>,
    /// Declared file name.
    pub file_name: Option<String>,
    /// Declared media type.
    pub content_type: Option<String>,
    /// Declared descriptive metadata.
    pub metadata: ArtifactMetadata,
    /// Owner of the upload.
    pub owner: String,
    /// Accept the upload even when classification found an exact
    /// duplicate. The store's digest uniqueness still holds, so no second
    /// copy is created; the outcome is backed by the artifact that already
    /// holds the content.
    pub allow_override: bool,
}

/// Result of an ingestion attempt.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The artifact now backing the upload: freshly persisted for
    /// `Accept`/`Flag`, the pre-existing exact match for an overridden
    /// `Reject`, `None` for a blocked upload.
    pub artifact: Option<FileArtifact>,
    /// Full classification against the corpus.
    pub matches: FileMatchResult,
    /// The derived decision.
    pub decision: UploadDecision,
}

impl UploadOutcome {
    /// Whether the upload was persisted.
    #[must_use]
    pub const fn persisted(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Upload ingestion service over an injected artifact store.
pub struct UploadService<S: ArtifactStore> {
    store: Arc<S>,
    matcher: FileMatcher<S>,
}

impl<S: ArtifactStore> UploadService<S> {
    /// Creates an upload service over the given store.
    #[must_use]
    pub fn new(store: Arc<S>, config: DetectionConfig) -> Self {
        let matcher = FileMatcher::new(Arc::clone(&store), config);
        Self { store, matcher }
    }

    /// Returns the matcher, for callers that want classification without
    /// ingestion.
    #[must_use]
    pub const fn matcher(&self) -> &FileMatcher<S> {
        &self.matcher
    }

    /// Ingests an upload: fingerprint, classify, decide, persist.
    ///
    /// A `Reject` decision without `allow_override` returns an outcome with
    /// no artifact — a blocked upload is a normal outcome, not an error.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::StoreUnavailable`] from corpus queries and
    /// [`crate::Error::DigestConflict`] when a concurrent upload won the
    /// insert race after classification saw no exact match. The conflict is
    /// surfaced, never swallowed: the caller reconciles against the artifact
    /// that got there first.
    #[instrument(
        skip(self, request),
        fields(
            operation = "ingest_upload",
            owner = %request.owner,
            size_bytes = request.content.len()
        )
    )]
    pub fn ingest(&self, request: UploadRequest) -> Result<UploadOutcome> {
        let digest = crate::fingerprint::fingerprint(&request.content);
        let size_bytes = request.content.len() as u64;

        let match_request = MatchRequest {
            digest: digest.clone(),
            size_bytes,
            content_type: request.content_type.clone(),
            metadata: request.metadata.clone(),
        };
        let matches = self.matcher.match_file(&match_request)?;
        let decision = matches.decision();

        if decision == UploadDecision::Reject {
            if request.allow_override {
                // Digest uniqueness still holds: the override reuses the
                // artifact that already stores this content.
                let existing = matches.exact.first().cloned();
                tracing::info!(digest = %digest, "exact duplicate overridden, reusing stored artifact");
                return Ok(UploadOutcome {
                    artifact: existing,
                    matches,
                    decision,
                });
            }
            tracing::info!(digest = %digest, "upload rejected, exact duplicate exists");
            return Ok(UploadOutcome {
                artifact: None,
                matches,
                decision,
            });
        }

        let artifact = FileArtifact {
            id: ArtifactId::generate(),
            content_digest: digest,
            size_bytes,
            file_name: request.file_name,
            content_type: request.content_type,
            metadata: request.metadata,
            owner: request.owner,
            download_count: 0,
            created_at: Utc::now(),
        };
        self.store.insert(&artifact)?;

        if decision == UploadDecision::Flag {
            tracing::info!(
                artifact_id = %artifact.id,
                by_size = matches.similar_by_size.len(),
                by_metadata = matches.similar_by_metadata.len(),
                "upload persisted with near-duplicate flags"
            );
        }

        Ok(UploadOutcome {
            artifact: Some(artifact),
            matches,
            decision,
        })
    }
}
