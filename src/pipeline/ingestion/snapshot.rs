//! Content-addressed snapshot storage for raw fetched pages.
//!
//! Snapshots are gzip-compressed on disk and keyed by content hash; the
//! hash index lives in a local SQLite database so storage-level dedup
//! survives process restarts.

use crate::error::Result;
use crate::observability::{emit_counter, emit_histogram, MetricName};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Metadata about a stored snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub snapshot_id: Uuid,
    /// Registry name of the source the content came from
    pub source_id: String,
    pub url: String,
    pub content_hash: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub compressed_size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
}

/// Storage for raw content snapshots.
///
/// Two saves with identical bytes map to the same snapshot: the content
/// hash is the dedup key.
pub trait SnapshotStore: Send + Sync {
    fn save_snapshot(
        &self,
        content: &[u8],
        source_id: &str,
        url: &str,
        content_hash: &str,
        mime_type: &str,
    ) -> Result<SnapshotMetadata>;

    fn get_snapshot(&self, snapshot_id: Uuid) -> Result<Option<Vec<u8>>>;

    fn get_snapshot_by_hash(&self, content_hash: &str) -> Result<Option<SnapshotMetadata>>;

    fn delete_snapshot(&self, snapshot_id: Uuid) -> Result<bool>;

    fn list_snapshots(
        &self,
        source_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SnapshotMetadata>>;
}

/// Aggregate storage statistics.
#[derive(Debug, Clone, Copy)]
pub struct StorageStats {
    pub total_snapshots: u64,
    pub total_size_bytes: u64,
    pub total_compressed_bytes: u64,
    pub compression_ratio: f64,
}

/// Local filesystem snapshot store.
///
/// Layout: `{base}/{YYYY}/{MM}/{DD}/{hash[..2]}/{snapshot_id}.{ext}.gz`
pub struct LocalSnapshotStore {
    base_path: PathBuf,
    index: Mutex<Connection>,
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "text/html" => "html",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "text/plain" => "txt",
        _ => "bin",
    }
}

impl LocalSnapshotStore {
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        let conn = Connection::open(base_path.join("index.db"))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS snapshots (
                snapshot_id            TEXT PRIMARY KEY,
                source_id              TEXT NOT NULL,
                url                    TEXT NOT NULL,
                content_hash           TEXT NOT NULL UNIQUE,
                mime_type              TEXT NOT NULL,
                size_bytes             INTEGER NOT NULL,
                compressed_size_bytes  INTEGER NOT NULL,
                created_at             TEXT NOT NULL,
                file_path              TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_source ON snapshots(source_id);
            "#,
        )?;

        Ok(Self {
            base_path,
            index: Mutex::new(conn),
        })
    }

    fn snapshot_path(
        &self,
        snapshot_id: Uuid,
        content_hash: &str,
        created_at: DateTime<Utc>,
        extension: &str,
    ) -> PathBuf {
        let date_path = created_at.format("%Y/%m/%d").to_string();
        let hash_prefix = content_hash.get(..2).unwrap_or("00");
        self.base_path
            .join(date_path)
            .join(hash_prefix)
            .join(format!("{}.{}.gz", snapshot_id, extension))
    }

    /// Aggregate counts and byte totals across all stored snapshots.
    pub fn storage_stats(&self) -> Result<StorageStats> {
        let conn = self.index.lock().unwrap();
        let (count, size, compressed): (u64, u64, u64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), COALESCE(SUM(compressed_size_bytes), 0)
             FROM snapshots",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, i64>(2)? as u64,
                ))
            },
        )?;

        Ok(StorageStats {
            total_snapshots: count,
            total_size_bytes: size,
            total_compressed_bytes: compressed,
            compression_ratio: if size > 0 {
                compressed as f64 / size as f64
            } else {
                0.0
            },
        })
    }
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotMetadata> {
    let snapshot_id: String = row.get(0)?;
    let created_at: String = row.get(7)?;
    Ok(SnapshotMetadata {
        snapshot_id: snapshot_id.parse().unwrap_or_default(),
        source_id: row.get(1)?,
        url: row.get(2)?,
        content_hash: row.get(3)?,
        mime_type: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)? as u64,
        compressed_size_bytes: row.get::<_, i64>(6)? as u64,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        file_path: row.get(8)?,
    })
}

const SELECT_COLUMNS: &str = "snapshot_id, source_id, url, content_hash, mime_type, \
                              size_bytes, compressed_size_bytes, created_at, file_path";

impl SnapshotStore for LocalSnapshotStore {
    fn save_snapshot(
        &self,
        content: &[u8],
        source_id: &str,
        url: &str,
        content_hash: &str,
        mime_type: &str,
    ) -> Result<SnapshotMetadata> {
        // Identical content maps to the existing snapshot
        if let Some(existing) = self.get_snapshot_by_hash(content_hash)? {
            emit_counter(MetricName::SnapshotsDeduplicated, 1);
            return Ok(existing);
        }

        let snapshot_id = Uuid::new_v4();
        let created_at = Utc::now();
        let extension = extension_for(mime_type);
        let file_path = self.snapshot_path(snapshot_id, content_hash, created_at, extension);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(6));
        encoder.write_all(content)?;
        let compressed = encoder.finish()?;
        fs::write(&file_path, &compressed)?;

        let metadata = SnapshotMetadata {
            snapshot_id,
            source_id: source_id.to_string(),
            url: url.to_string(),
            content_hash: content_hash.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes: content.len() as u64,
            compressed_size_bytes: compressed.len() as u64,
            created_at,
            file_path: file_path.to_string_lossy().into_owned(),
        };

        let conn = self.index.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (snapshot_id, source_id, url, content_hash, mime_type,
                                    size_bytes, compressed_size_bytes, created_at, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                metadata.snapshot_id.to_string(),
                metadata.source_id,
                metadata.url,
                metadata.content_hash,
                metadata.mime_type,
                metadata.size_bytes as i64,
                metadata.compressed_size_bytes as i64,
                metadata.created_at.to_rfc3339(),
                metadata.file_path,
            ],
        )?;

        emit_counter(MetricName::SnapshotsStored, 1);
        emit_histogram(MetricName::SnapshotCompressedBytes, compressed.len() as f64);
        debug!(
            "Stored snapshot {} for {} ({} -> {} bytes)",
            metadata.snapshot_id, url, metadata.size_bytes, metadata.compressed_size_bytes
        );

        Ok(metadata)
    }

    fn get_snapshot(&self, snapshot_id: Uuid) -> Result<Option<Vec<u8>>> {
        let file_path: Option<String> = {
            let conn = self.index.lock().unwrap();
            conn.query_row(
                "SELECT file_path FROM snapshots WHERE snapshot_id = ?1",
                params![snapshot_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
        };

        let Some(file_path) = file_path else {
            return Ok(None);
        };
        if !Path::new(&file_path).exists() {
            return Ok(None);
        }

        let compressed = fs::read(&file_path)?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut content = Vec::new();
        decoder.read_to_end(&mut content)?;
        Ok(Some(content))
    }

    fn get_snapshot_by_hash(&self, content_hash: &str) -> Result<Option<SnapshotMetadata>> {
        let conn = self.index.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM snapshots WHERE content_hash = ?1", SELECT_COLUMNS),
                params![content_hash],
                |row| row_to_metadata(row),
            )
            .optional()?;
        Ok(row)
    }

    fn delete_snapshot(&self, snapshot_id: Uuid) -> Result<bool> {
        let conn = self.index.lock().unwrap();
        let file_path: Option<String> = conn
            .query_row(
                "SELECT file_path FROM snapshots WHERE snapshot_id = ?1",
                params![snapshot_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(file_path) = file_path else {
            return Ok(false);
        };

        conn.execute(
            "DELETE FROM snapshots WHERE snapshot_id = ?1",
            params![snapshot_id.to_string()],
        )?;
        if Path::new(&file_path).exists() {
            fs::remove_file(&file_path)?;
        }
        Ok(true)
    }

    fn list_snapshots(
        &self,
        source_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SnapshotMetadata>> {
        let conn = self.index.lock().unwrap();
        let mut results = Vec::new();

        match source_id {
            Some(source) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM snapshots WHERE source_id = ?1
                     ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(
                    params![source, limit as i64, offset as i64],
                    |row| row_to_metadata(row),
                )?;
                for row in rows {
                    results.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM snapshots ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
                    row_to_metadata(row)
                })?;
                for row in rows {
                    results.push(row?);
                }
            }
        }

        Ok(results)
    }
}
