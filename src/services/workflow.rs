//! Duplicate resolution workflow.
//!
//! The lifecycle state machine for contact records:
//!
//! ```text
//!              ┌─────────┐
//!   create ───▶│ active  │
//!              └────┬────┘
//!          merge │      │ delete
//!                ▼      ▼
//!           ┌────────┐ ┌─────────┐
//!           │ merged │ │ deleted │   (terminal, soft)
//!           └────────┘ └─────────┘
//! ```
//!
//! Duplicate metadata set at creation (`duplicate_of`, `duplicate_score`) is
//! advisory only; status changes happen exclusively through `merge` and
//! `delete`. Records are never physically removed.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

use crate::config::DetectionConfig;
use crate::models::{ContactRecord, NewContactRecord, RecordId, RecordStatus};
use crate::services::scorer::RecordScorer;
use crate::storage::RecordStore;
use crate::{Error, Result};

/// Resolution workflow over an injected record store.
pub struct ResolutionWorkflow<S: RecordStore> {
    store: Arc<S>,
    scorer: RecordScorer,
}

impl<S: RecordStore> ResolutionWorkflow<S> {
    /// Creates a workflow with the default scorer for the given config.
    #[must_use]
    pub fn new(store: Arc<S>, config: DetectionConfig) -> Self {
        Self {
            store,
            scorer: RecordScorer::new(config),
        }
    }

    /// Creates a workflow with a caller-supplied scorer.
    #[must_use]
    pub fn with_scorer(store: Arc<S>, scorer: RecordScorer) -> Self {
        Self { store, scorer }
    }

    /// Creates an active record, scoring it against the active corpus.
    ///
    /// When duplicates are found, the new record's `duplicate_of` is set to
    /// the highest-scoring candidate and `duplicate_score` to that score.
    /// This is advisory metadata: the record is still created as active.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::StoreUnavailable`] from the corpus query or the
    /// insert. Detection failure fails the call; it never silently creates
    /// the record with fabricated (empty) duplicate metadata.
    #[instrument(skip(self, request), fields(operation = "create_record"))]
    pub fn create(&self, request: NewContactRecord) -> Result<ContactRecord> {
        let mut record = request.into_record();

        let candidates = self.store.list_active()?;
        let duplicates = self.scorer.score(&record, &candidates, None)?;

        if let Some(best) = duplicates.first() {
            tracing::info!(
                record_id = %record.id,
                duplicate_of = %best.candidate_id,
                score = best.score,
                "new record flagged as duplicate"
            );
            record.duplicate_of = Some(RecordId::new(best.candidate_id.clone()));
            record.duplicate_score = Some(best.score);
        }

        self.store.insert(&record)?;
        Ok(record)
    }

    /// Merges a subject record into a primary record.
    ///
    /// Sets `subject.status = merged` and `subject.duplicate_of = primary`.
    /// Which field values survive on the primary is the caller's decision;
    /// the workflow only records the linkage and the state change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when subject and primary are the same
    /// record, either id is unknown, the subject is already terminal, or the
    /// primary is not active.
    #[instrument(skip(self), fields(operation = "merge_record", subject = %subject_id, primary = %primary_id))]
    pub fn merge(&self, subject_id: &RecordId, primary_id: &RecordId) -> Result<ContactRecord> {
        if subject_id == primary_id {
            return Err(Error::InvalidInput(
                "cannot merge a record into itself".to_string(),
            ));
        }

        let mut subject = self.require(subject_id)?;
        if subject.status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "record {subject_id} is already {} and cannot be merged",
                subject.status
            )));
        }

        let primary = self.require(primary_id)?;
        if primary.status != RecordStatus::Active {
            return Err(Error::InvalidInput(format!(
                "primary record {primary_id} is {}, expected active",
                primary.status
            )));
        }

        subject.status = RecordStatus::Merged;
        subject.duplicate_of = Some(primary_id.clone());
        subject.updated_at = Utc::now();
        self.store.update(&subject)?;

        tracing::info!(subject = %subject_id, primary = %primary_id, "record merged");
        metrics::counter!("doppel_record_resolutions_total", "action" => "merge").increment(1);
        Ok(subject)
    }

    /// Soft-deletes a record.
    ///
    /// The record is retained for audit with `status = deleted` and is
    /// permanently excluded from future active-candidate sets. Idempotent:
    /// deleting an already-deleted record is a no-op that returns the
    /// record unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown id or a merged record
    /// (merged is terminal).
    #[instrument(skip(self), fields(operation = "delete_record", record = %id))]
    pub fn delete(&self, id: &RecordId) -> Result<ContactRecord> {
        let mut record = self.require(id)?;

        match record.status {
            RecordStatus::Deleted => {
                tracing::debug!(record = %id, "already deleted, no-op");
                return Ok(record);
            },
            RecordStatus::Merged => {
                return Err(Error::InvalidInput(format!(
                    "record {id} is merged and cannot transition"
                )));
            },
            RecordStatus::Active => {},
        }

        record.status = RecordStatus::Deleted;
        record.updated_at = Utc::now();
        self.store.update(&record)?;

        tracing::info!(record = %id, "record soft-deleted");
        metrics::counter!("doppel_record_resolutions_total", "action" => "delete").increment(1);
        Ok(record)
    }

    fn require(&self, id: &RecordId) -> Result<ContactRecord> {
        self.store
            .get(id)?
            .ok_or_else(|| Error::InvalidInput(format!("unknown record id {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRecordStore;

    fn workflow() -> (Arc<InMemoryRecordStore>, ResolutionWorkflow<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let wf = ResolutionWorkflow::new(Arc::clone(&store), DetectionConfig::default());
        (store, wf)
    }

    fn new_record(name: &str, email: &str) -> NewContactRecord {
        NewContactRecord {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_without_duplicates() {
        let (_, wf) = workflow();
        let record = wf.create(new_record("John Smith", "john@x.com")).unwrap();
        assert_eq!(record.status, RecordStatus::Active);
        assert!(record.duplicate_of.is_none());
        assert!(record.duplicate_score.is_none());
    }

    #[test]
    fn test_create_identical_record_links_to_first() {
        let (_, wf) = workflow();
        let first = wf.create(new_record("John Smith", "john@x.com")).unwrap();
        let second = wf.create(new_record("John Smith", "john@x.com")).unwrap();

        assert_eq!(second.duplicate_of, Some(first.id));
        assert!((second.duplicate_score.unwrap() - 1.0).abs() < f64::EPSILON);
        // Advisory only: still created active.
        assert_eq!(second.status, RecordStatus::Active);
    }

    #[test]
    fn test_merge_marks_subject_terminal() {
        let (store, wf) = workflow();
        let primary = wf.create(new_record("Jane", "jane@x.com")).unwrap();
        let subject = wf.create(new_record("Janet", "janet@y.org")).unwrap();

        let merged = wf.merge(&subject.id, &primary.id).unwrap();
        assert_eq!(merged.status, RecordStatus::Merged);
        assert_eq!(merged.duplicate_of, Some(primary.id));

        // Merged records leave the active candidate set.
        let active = store.list_active().unwrap();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_merge_into_self_rejected() {
        let (_, wf) = workflow();
        let record = wf.create(new_record("A", "a@x.com")).unwrap();
        assert!(wf.merge(&record.id, &record.id).is_err());
    }

    #[test]
    fn test_merge_requires_active_primary() {
        let (_, wf) = workflow();
        let primary = wf.create(new_record("P", "p@x.com")).unwrap();
        let subject = wf.create(new_record("S", "s@x.com")).unwrap();
        wf.delete(&primary.id).unwrap();

        let err = wf.merge(&subject.id, &primary.id).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_merged_record_cannot_transition_again() {
        let (_, wf) = workflow();
        let primary = wf.create(new_record("P", "p@x.com")).unwrap();
        let other = wf.create(new_record("O", "o@x.com")).unwrap();
        let subject = wf.create(new_record("S", "s@x.com")).unwrap();
        wf.merge(&subject.id, &primary.id).unwrap();

        assert!(wf.merge(&subject.id, &other.id).is_err());
        assert!(wf.delete(&subject.id).is_err());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, wf) = workflow();
        let record = wf.create(new_record("Del", "del@x.com")).unwrap();

        let first = wf.delete(&record.id).unwrap();
        assert_eq!(first.status, RecordStatus::Deleted);

        // Second delete is a safe no-op.
        let second = wf.delete(&record.id).unwrap();
        assert_eq!(second.status, RecordStatus::Deleted);

        assert!(store.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_deleted_record_excluded_from_future_scoring() {
        let (_, wf) = workflow();
        let first = wf.create(new_record("John Smith", "john@x.com")).unwrap();
        wf.delete(&first.id).unwrap();

        // An identical record created afterwards finds no duplicate.
        let second = wf.create(new_record("John Smith", "john@x.com")).unwrap();
        assert!(second.duplicate_of.is_none());
    }

    #[test]
    fn test_unknown_ids_are_invalid_input() {
        let (_, wf) = workflow();
        let ghost = RecordId::new("ghost");
        assert!(matches!(wf.delete(&ghost), Err(Error::InvalidInput(_))));
        assert!(matches!(
            wf.merge(&ghost, &RecordId::new("other")),
            Err(Error::InvalidInput(_))
        ));
    }
}
