//! `SQLite`-backed corpus store.
//!
//! Durable implementation of both repository traits over a single database.
//! Digest uniqueness is enforced by a `UNIQUE` constraint on
//! `artifacts.content_digest`, so two racing uploads of identical content
//! resolve deterministically: the second insert fails with
//! [`Error::DigestConflict`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::fingerprint::ContentDigest;
use crate::models::{
    ArtifactId, ArtifactMetadata, ContactRecord, FileArtifact, RecordId, RecordStatus,
    TemporalRange,
};
use crate::storage::traits::{ArtifactStore, RecordStore};
use crate::{Error, Result};

/// How long `SQLite` waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite`-backed implementation of [`ArtifactStore`] and [`RecordStore`].
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// WAL mode allows concurrent readers with a single writer, and the busy
/// timeout waits on locks instead of failing immediately.
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

fn store_err(operation: &str, cause: &rusqlite::Error) -> Error {
    Error::StoreUnavailable {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

impl SqliteStore {
    /// Opens (creating if needed) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be opened
    /// or the schema cannot be initialized.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| store_err("open", &e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if initialization fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| store_err("open_in_memory", &e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock();

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| store_err("busy_timeout", &e))?;
        // journal_mode returns a row; read and discard it.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .map_err(|e| store_err("journal_mode", &e))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| store_err("synchronous", &e))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                content_digest TEXT NOT NULL UNIQUE,
                size_bytes INTEGER NOT NULL,
                file_name TEXT,
                content_type TEXT,
                temporal_start INTEGER,
                temporal_end INTEGER,
                spatial_domain TEXT,
                owner TEXT NOT NULL,
                download_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_artifacts_size ON artifacts(size_bytes);
            CREATE INDEX IF NOT EXISTS idx_artifacts_spatial ON artifacts(spatial_domain);
            CREATE INDEX IF NOT EXISTS idx_artifacts_temporal ON artifacts(temporal_start, temporal_end);

            CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                name TEXT,
                email TEXT,
                phone TEXT,
                attributes TEXT NOT NULL,
                status TEXT NOT NULL,
                duplicate_of TEXT,
                duplicate_score REAL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_contacts_status ON contacts(status);",
        )
        .map_err(|e| store_err("initialize_schema", &e))?;

        Ok(())
    }

    fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<FileArtifact> {
        let digest_hex: String = row.get("content_digest")?;
        let temporal_start: Option<i64> = row.get("temporal_start")?;
        let temporal_end: Option<i64> = row.get("temporal_end")?;
        let temporal_range = match (temporal_start, temporal_end) {
            (Some(start), Some(end)) => Some(TemporalRange {
                start: from_millis(start),
                end: from_millis(end),
            }),
            _ => None,
        };
        let size_bytes: i64 = row.get("size_bytes")?;
        let download_count: i64 = row.get("download_count")?;
        let created_at: i64 = row.get("created_at")?;

        Ok(FileArtifact {
            id: ArtifactId::new(row.get::<_, String>("id")?),
            content_digest: ContentDigest::parse(&digest_hex).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    )),
                )
            })?,
            size_bytes: size_bytes.max(0).unsigned_abs(),
            file_name: row.get("file_name")?,
            content_type: row.get("content_type")?,
            metadata: ArtifactMetadata {
                temporal_range,
                spatial_domain: row.get("spatial_domain")?,
            },
            owner: row.get("owner")?,
            download_count: download_count.max(0).unsigned_abs(),
            created_at: from_millis(created_at),
        })
    }

    fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRecord> {
        let attributes_json: String = row.get("attributes")?;
        let attributes = serde_json::from_str(&attributes_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status_str: String = row.get("status")?;
        let status = RecordStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unknown record status {status_str:?}"),
                )),
            )
        })?;
        let created_at: i64 = row.get("created_at")?;
        let updated_at: i64 = row.get("updated_at")?;

        Ok(ContactRecord {
            id: RecordId::new(row.get::<_, String>("id")?),
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            attributes,
            status,
            duplicate_of: row
                .get::<_, Option<String>>("duplicate_of")?
                .map(RecordId::new),
            duplicate_score: row.get("duplicate_score")?,
            created_at: from_millis(created_at),
            updated_at: from_millis(updated_at),
        })
    }

    fn query_artifacts(
        conn: &Connection,
        operation: &str,
        sql: &str,
        params: &[&dyn rusqlite::types::ToSql],
    ) -> Result<Vec<FileArtifact>> {
        let mut stmt = conn.prepare(sql).map_err(|e| store_err(operation, &e))?;
        let rows = stmt
            .query_map(params, |row| Self::artifact_from_row(row))
            .map_err(|e| store_err(operation, &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| store_err(operation, &e))
    }
}

#[allow(clippy::cast_possible_wrap)]
impl ArtifactStore for SqliteStore {
    fn insert(&self, artifact: &FileArtifact) -> Result<()> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO artifacts (
                id, content_digest, size_bytes, file_name, content_type,
                temporal_start, temporal_end, spatial_domain, owner,
                download_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                artifact.id.as_str(),
                artifact.content_digest.as_str(),
                artifact.size_bytes as i64,
                artifact.file_name,
                artifact.content_type,
                artifact.metadata.temporal_range.map(|r| millis(r.start)),
                artifact.metadata.temporal_range.map(|r| millis(r.end)),
                artifact.metadata.spatial_domain,
                artifact.owner,
                artifact.download_count as i64,
                millis(artifact.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
                    && e.to_string().contains("content_digest") =>
            {
                Err(Error::DigestConflict {
                    digest: artifact.content_digest.as_str().to_string(),
                })
            },
            Err(e)
                if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) =>
            {
                Err(Error::InvalidInput(format!(
                    "artifact id {} already exists",
                    artifact.id
                )))
            },
            Err(e) => Err(store_err("insert_artifact", &e)),
        }
    }

    fn get(&self, id: &ArtifactId) -> Result<Option<FileArtifact>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM artifacts WHERE id = ?1",
            params![id.as_str()],
            |row| Self::artifact_from_row(row),
        )
        .optional()
        .map_err(|e| store_err("get_artifact", &e))
    }

    fn find_by_digest(&self, digest: &ContentDigest) -> Result<Vec<FileArtifact>> {
        let conn = self.lock();
        Self::query_artifacts(
            &conn,
            "find_by_digest",
            "SELECT * FROM artifacts WHERE content_digest = ?1 ORDER BY id",
            &[&digest.as_str()],
        )
    }

    fn find_by_size_range(&self, min_bytes: u64, max_bytes: u64) -> Result<Vec<FileArtifact>> {
        let conn = self.lock();
        Self::query_artifacts(
            &conn,
            "find_by_size_range",
            "SELECT * FROM artifacts WHERE size_bytes BETWEEN ?1 AND ?2 ORDER BY id",
            &[&(min_bytes as i64), &(max_bytes as i64)],
        )
    }

    fn find_by_metadata(
        &self,
        temporal: Option<&TemporalRange>,
        spatial_domain: Option<&str>,
    ) -> Result<Vec<FileArtifact>> {
        let conn = self.lock();
        match (temporal, spatial_domain) {
            (Some(range), Some(domain)) => Self::query_artifacts(
                &conn,
                "find_by_metadata",
                "SELECT * FROM artifacts
                 WHERE temporal_start <= ?1 AND temporal_end >= ?2
                   AND spatial_domain = ?3
                 ORDER BY id",
                &[&millis(range.end), &millis(range.start), &domain],
            ),
            (Some(range), None) => Self::query_artifacts(
                &conn,
                "find_by_metadata",
                "SELECT * FROM artifacts
                 WHERE temporal_start <= ?1 AND temporal_end >= ?2
                 ORDER BY id",
                &[&millis(range.end), &millis(range.start)],
            ),
            (None, Some(domain)) => Self::query_artifacts(
                &conn,
                "find_by_metadata",
                "SELECT * FROM artifacts WHERE spatial_domain = ?1 ORDER BY id",
                &[&domain],
            ),
            (None, None) => Ok(Vec::new()),
        }
    }

    fn record_download(&self, id: &ArtifactId) -> Result<u64> {
        let conn = self.lock();
        let count: Option<i64> = conn
            .query_row(
                "UPDATE artifacts SET download_count = download_count + 1
                 WHERE id = ?1 RETURNING download_count",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| store_err("record_download", &e))?;

        count
            .map(i64::unsigned_abs)
            .ok_or_else(|| Error::InvalidInput(format!("unknown artifact id {id}")))
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))
            .map_err(|e| store_err("count_artifacts", &e))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

impl RecordStore for SqliteStore {
    fn insert(&self, record: &ContactRecord) -> Result<()> {
        let attributes_json = serde_json::to_string(&record.attributes)
            .map_err(|e| Error::InvalidInput(format!("unserializable attributes: {e}")))?;
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO contacts (
                id, name, email, phone, attributes, status,
                duplicate_of, duplicate_score, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.as_str(),
                record.name,
                record.email,
                record.phone,
                attributes_json,
                record.status.as_str(),
                record.duplicate_of.as_ref().map(RecordId::as_str),
                record.duplicate_score,
                millis(record.created_at),
                millis(record.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) =>
            {
                Err(Error::InvalidInput(format!(
                    "record id {} already exists",
                    record.id
                )))
            },
            Err(e) => Err(store_err("insert_record", &e)),
        }
    }

    fn get(&self, id: &RecordId) -> Result<Option<ContactRecord>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM contacts WHERE id = ?1",
            params![id.as_str()],
            |row| Self::record_from_row(row),
        )
        .optional()
        .map_err(|e| store_err("get_record", &e))
    }

    fn list_active(&self) -> Result<Vec<ContactRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM contacts WHERE status = 'active' ORDER BY id")
            .map_err(|e| store_err("list_active", &e))?;
        let rows = stmt
            .query_map([], |row| Self::record_from_row(row))
            .map_err(|e| store_err("list_active", &e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| store_err("list_active", &e))
    }

    fn update(&self, record: &ContactRecord) -> Result<()> {
        let attributes_json = serde_json::to_string(&record.attributes)
            .map_err(|e| Error::InvalidInput(format!("unserializable attributes: {e}")))?;
        let conn = self.lock();
        let changed = conn
            .execute(
                "UPDATE contacts SET
                    name = ?2, email = ?3, phone = ?4, attributes = ?5,
                    status = ?6, duplicate_of = ?7, duplicate_score = ?8,
                    updated_at = ?9
                 WHERE id = ?1",
                params![
                    record.id.as_str(),
                    record.name,
                    record.email,
                    record.phone,
                    attributes_json,
                    record.status.as_str(),
                    record.duplicate_of.as_ref().map(RecordId::as_str),
                    record.duplicate_score,
                    millis(record.updated_at),
                ],
            )
            .map_err(|e| store_err("update_record", &e))?;

        if changed == 0 {
            return Err(Error::InvalidInput(format!(
                "unknown record id {}",
                record.id
            )));
        }
        Ok(())
    }
}
