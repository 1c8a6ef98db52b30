//! Corpus storage backends.
//!
//! The engine never touches persistence directly; it goes through the
//! [`ArtifactStore`] and [`RecordStore`] repository traits. Two backends are
//! provided: an in-memory implementation (tests, light embedding) and a
//! `SQLite` implementation whose schema enforces digest uniqueness so the
//! upload check-then-act race resolves deterministically.

mod memory;
mod sqlite;
mod traits;

pub use memory::{InMemoryArtifactStore, InMemoryRecordStore};
pub use sqlite::SqliteStore;
pub use traits::{ArtifactStore, RecordStore};
