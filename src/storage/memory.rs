//! In-memory storage backends.
//!
//! `HashMap`-backed implementations of the repository traits, used as the
//! test double and for embedding the engine without a database. They uphold
//! the same invariants as the `SQLite` backend, including digest uniqueness
//! at insert time.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::fingerprint::ContentDigest;
use crate::models::{ArtifactId, ContactRecord, FileArtifact, RecordId, TemporalRange};
use crate::storage::traits::{ArtifactStore, RecordStore};
use crate::{Error, Result};

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn metadata_matches(
    artifact: &FileArtifact,
    temporal: Option<&TemporalRange>,
    spatial_domain: Option<&str>,
) -> bool {
    let temporal_ok = temporal.map(|subject_range| {
        artifact
            .metadata
            .temporal_range
            .as_ref()
            .is_some_and(|candidate_range| candidate_range.overlaps(subject_range))
    });
    let spatial_ok = spatial_domain.map(|subject_domain| {
        artifact
            .metadata
            .spatial_domain
            .as_deref()
            .is_some_and(|candidate_domain| candidate_domain == subject_domain)
    });

    match (temporal_ok, spatial_ok) {
        (Some(t), Some(s)) => t && s,
        (Some(t), None) => t,
        (None, Some(s)) => s,
        (None, None) => false,
    }
}

/// In-memory [`ArtifactStore`] backend.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<ArtifactId, FileArtifact>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn insert(&self, artifact: &FileArtifact) -> Result<()> {
        let mut artifacts = write_lock(&self.artifacts);
        if artifacts
            .values()
            .any(|existing| existing.content_digest == artifact.content_digest)
        {
            return Err(Error::DigestConflict {
                digest: artifact.content_digest.as_str().to_string(),
            });
        }
        if artifacts.contains_key(&artifact.id) {
            return Err(Error::InvalidInput(format!(
                "artifact id {} already exists",
                artifact.id
            )));
        }
        artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(())
    }

    fn get(&self, id: &ArtifactId) -> Result<Option<FileArtifact>> {
        Ok(read_lock(&self.artifacts).get(id).cloned())
    }

    fn find_by_digest(&self, digest: &ContentDigest) -> Result<Vec<FileArtifact>> {
        let mut found: Vec<FileArtifact> = read_lock(&self.artifacts)
            .values()
            .filter(|a| &a.content_digest == digest)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn find_by_size_range(&self, min_bytes: u64, max_bytes: u64) -> Result<Vec<FileArtifact>> {
        let mut found: Vec<FileArtifact> = read_lock(&self.artifacts)
            .values()
            .filter(|a| (min_bytes..=max_bytes).contains(&a.size_bytes))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn find_by_metadata(
        &self,
        temporal: Option<&TemporalRange>,
        spatial_domain: Option<&str>,
    ) -> Result<Vec<FileArtifact>> {
        let mut found: Vec<FileArtifact> = read_lock(&self.artifacts)
            .values()
            .filter(|a| metadata_matches(a, temporal, spatial_domain))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn record_download(&self, id: &ArtifactId) -> Result<u64> {
        let mut artifacts = write_lock(&self.artifacts);
        let artifact = artifacts
            .get_mut(id)
            .ok_or_else(|| Error::InvalidInput(format!("unknown artifact id {id}")))?;
        artifact.download_count += 1;
        Ok(artifact.download_count)
    }

    fn count(&self) -> Result<usize> {
        Ok(read_lock(&self.artifacts).len())
    }
}

/// In-memory [`RecordStore`] backend.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordId, ContactRecord>>,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: &ContactRecord) -> Result<()> {
        let mut records = write_lock(&self.records);
        if records.contains_key(&record.id) {
            return Err(Error::InvalidInput(format!(
                "record id {} already exists",
                record.id
            )));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &RecordId) -> Result<Option<ContactRecord>> {
        Ok(read_lock(&self.records).get(id).cloned())
    }

    fn list_active(&self) -> Result<Vec<ContactRecord>> {
        let mut active: Vec<ContactRecord> = read_lock(&self.records)
            .values()
            .filter(|r| r.status == crate::models::RecordStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    fn update(&self, record: &ContactRecord) -> Result<()> {
        let mut records = write_lock(&self.records);
        if !records.contains_key(&record.id) {
            return Err(Error::InvalidInput(format!(
                "unknown record id {}",
                record.id
            )));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::models::{ArtifactMetadata, NewContactRecord, RecordStatus};
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

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> TemporalRange {
        TemporalRange::from_dates(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_find_by_digest() {
        let store = InMemoryArtifactStore::new();
        let a = artifact("a1", b"content one", 100);
        store.insert(&a).unwrap();

        let found = store.find_by_digest(&a.content_digest).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);

        let other = fingerprint(b"something else");
        assert!(store.find_by_digest(&other).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_digest_insert_conflicts() {
        let store = InMemoryArtifactStore::new();
        store.insert(&artifact("a1", b"same bytes", 100)).unwrap();

        let err = store
            .insert(&artifact("a2", b"same bytes", 100))
            .unwrap_err();
        assert!(matches!(err, Error::DigestConflict { .. }));
    }

    #[test]
    fn test_size_range_bounds_are_closed() {
        let store = InMemoryArtifactStore::new();
        store.insert(&artifact("low", b"low", 950)).unwrap();
        store.insert(&artifact("high", b"high", 1050)).unwrap();
        store.insert(&artifact("out", b"out", 1051)).unwrap();

        let found = store.find_by_size_range(950, 1050).unwrap();
        let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[test]
    fn test_metadata_query_ands_both_predicates() {
        let store = InMemoryArtifactStore::new();
        let mut both = artifact("both", b"both", 10);
        both.metadata = ArtifactMetadata {
            temporal_range: Some(range((2024, 1, 1), (2024, 1, 31))),
            spatial_domain: Some("basin-a".to_string()),
        };
        let mut temporal_only = artifact("temporal", b"temporal", 10);
        temporal_only.metadata = ArtifactMetadata {
            temporal_range: Some(range((2024, 1, 1), (2024, 1, 31))),
            spatial_domain: Some("basin-b".to_string()),
        };
        store.insert(&both).unwrap();
        store.insert(&temporal_only).unwrap();

        let subject_range = range((2024, 1, 15), (2024, 2, 15));

        // Both predicates: only the artifact matching both qualifies.
        let found = store
            .find_by_metadata(Some(&subject_range), Some("basin-a"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "both");

        // Temporal alone governs when spatial is absent.
        let found = store.find_by_metadata(Some(&subject_range), None).unwrap();
        assert_eq!(found.len(), 2);

        // Neither predicate: empty.
        assert!(store.find_by_metadata(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_record_download_increments() {
        let store = InMemoryArtifactStore::new();
        let a = artifact("a1", b"bytes", 5);
        store.insert(&a).unwrap();

        assert_eq!(store.record_download(&a.id).unwrap(), 1);
        assert_eq!(store.record_download(&a.id).unwrap(), 2);
        assert_eq!(store.get(&a.id).unwrap().unwrap().download_count, 2);

        let err = store.record_download(&ArtifactId::new("nope")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_list_active_excludes_terminal_records() {
        let store = InMemoryRecordStore::new();
        let active = NewContactRecord::default().into_record();
        let mut deleted = NewContactRecord::default().into_record();
        deleted.status = RecordStatus::Deleted;
        let mut merged = NewContactRecord::default().into_record();
        merged.status = RecordStatus::Merged;

        store.insert(&active).unwrap();
        store.insert(&deleted).unwrap();
        store.insert(&merged).unwrap();

        let listed = store.list_active().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, active.id);
    }

    #[test]
    fn test_update_unknown_record_fails() {
        let store = InMemoryRecordStore::new();
        let record = NewContactRecord::default().into_record();
        let err = store.update(&record).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
