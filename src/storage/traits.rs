//! Repository traits for the persisted corpus.

use crate::Result;
use crate::fingerprint::ContentDigest;
use crate::models::{ArtifactId, ContactRecord, FileArtifact, RecordId, TemporalRange};

/// Repository of stored file artifacts.
///
/// Backends are the authoritative corpus the matcher classifies against.
/// Implementations must enforce digest uniqueness at insert time: the
/// second insert of an already-stored digest fails with
/// [`crate::Error::DigestConflict`] rather than creating a silent duplicate.
pub trait ArtifactStore: Send + Sync {
    /// Persists a new artifact.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DigestConflict`] when an artifact with the
    /// same content digest already exists, or
    /// [`crate::Error::StoreUnavailable`] on backend failure.
    fn insert(&self, artifact: &FileArtifact) -> Result<()>;

    /// Retrieves an artifact by ID.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] on backend failure.
    fn get(&self, id: &ArtifactId) -> Result<Option<FileArtifact>>;

    /// Finds all artifacts with exactly the given content digest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] on backend failure.
    fn find_by_digest(&self, digest: &ContentDigest) -> Result<Vec<FileArtifact>>;

    /// Finds artifacts whose size lies in the closed interval `[min, max]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] on backend failure.
    fn find_by_size_range(&self, min_bytes: u64, max_bytes: u64) -> Result<Vec<FileArtifact>>;

    /// Finds artifacts by declared-metadata predicates.
    ///
    /// A temporal predicate matches artifacts whose range overlaps the given
    /// range (inclusive); a spatial predicate matches by exact string
    /// equality. When both predicates are supplied they are ANDed; when only
    /// one is supplied it alone governs; when neither is supplied the result
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] on backend failure.
    fn find_by_metadata(
        &self,
        temporal: Option<&TemporalRange>,
        spatial_domain: Option<&str>,
    ) -> Result<Vec<FileArtifact>>;

    /// Atomically increments an artifact's download count.
    ///
    /// Returns the new count.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for an unknown id or
    /// [`crate::Error::StoreUnavailable`] on backend failure.
    fn record_download(&self, id: &ArtifactId) -> Result<u64>;

    /// Returns the total number of stored artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] on backend failure.
    fn count(&self) -> Result<usize>;
}

/// Repository of contact records.
///
/// Records are never physically deleted; the resolution workflow moves them
/// to terminal statuses and `list_active` excludes them from then on.
pub trait RecordStore: Send + Sync {
    /// Persists a new record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when the id already exists or
    /// [`crate::Error::StoreUnavailable`] on backend failure.
    fn insert(&self, record: &ContactRecord) -> Result<()>;

    /// Retrieves a record by ID.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] on backend failure.
    fn get(&self, id: &RecordId) -> Result<Option<ContactRecord>>;

    /// Lists all records with status `active`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] on backend failure.
    fn list_active(&self) -> Result<Vec<ContactRecord>>;

    /// Updates an existing record in place.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for an unknown id or
    /// [`crate::Error::StoreUnavailable`] on backend failure.
    fn update(&self, record: &ContactRecord) -> Result<()>;
}
