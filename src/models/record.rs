//! Contact record types and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a contact record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new record ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random (UUID v4) record ID.
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

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a contact record.
///
/// `Active` is the initial state; `Merged` and `Deleted` are terminal.
/// Records are never physically removed: `Deleted` is a soft state retained
/// for audit, and such records are permanently excluded from the
/// active-candidate set used by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Record participates in duplicate scoring.
    Active,
    /// Record was merged into a primary record (terminal).
    Merged,
    /// Record was soft-deleted (terminal).
    Deleted,
}

impl RecordStatus {
    /// Returns the status as a stable string (storage representation).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Merged => "merged",
            Self::Deleted => "deleted",
        }
    }

    /// Parses the storage representation back into a status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "merged" => Some(Self::Merged),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether the status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Deleted)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured contact record.
///
/// The three promoted fields (name, email, phone) drive similarity scoring;
/// everything else lives in the typed `attributes` extension map and is
/// never consulted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Unique identifier.
    pub id: RecordId,
    /// Contact name.
    pub name: Option<String>,
    /// Contact email address.
    pub email: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Open extension attributes (not consulted for similarity).
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Lifecycle status.
    pub status: RecordStatus,
    /// Weak back-reference to the primary record this one duplicates.
    ///
    /// Advisory metadata, never an ownership link. At most one primary per
    /// duplicate. Populated by the scorer on creation and by `merge`.
    pub duplicate_of: Option<RecordId>,
    /// Aggregate similarity score against `duplicate_of`, in `[0, 1]`.
    pub duplicate_score: Option<f64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp (resolution workflow only).
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a contact record through the resolution workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContactRecord {
    /// Contact name.
    pub name: Option<String>,
    /// Contact email address.
    pub email: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Open extension attributes.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl NewContactRecord {
    /// Materializes the request into an active record with a fresh id.
    #[must_use]
    pub fn into_record(self) -> ContactRecord {
        let now = Utc::now();
        ContactRecord {
            id: RecordId::generate(),
            name: self.name,
            email: self.email,
            phone: self.phone,
            attributes: self.attributes,
            status: RecordStatus::Active,
            duplicate_of: None,
            duplicate_score: None,
            created_at: now,
            updated_at: now,
        }
    }
}
