use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::{CONTENT_DB_FILE, ContentVersion};
use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use crate::schema::{CONTENT_SCHEMA_VERSION, META_SCHEMA_VERSION, META_SEQUENCE, META_VERSION, read_meta};

/// Idle read connections kept per snapshot.
const MAX_IDLE_CONNECTIONS: usize = 4;

/// Errors raised while opening or reading a content snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot database could not be opened.
    #[error("failed to open content snapshot at {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// Snapshot metadata could not be read.
    #[error("failed to read content metadata '{key}' from {path}")]
    Meta {
        /// Database path.
        path: Utf8PathBuf,
        /// Metadata key.
        key: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// Required metadata is missing or malformed.
    #[error("content metadata '{key}' in {path} is missing or invalid")]
    InvalidMeta {
        /// Database path.
        path: Utf8PathBuf,
        /// Metadata key.
        key: &'static str,
    },
    /// The snapshot uses another schema version.
    #[error("content snapshot {path} has schema version {found}, expected {expected}")]
    SchemaVersion {
        /// Database path.
        path: Utf8PathBuf,
        /// Version this build reads.
        expected: i64,
        /// Version recorded in the snapshot.
        found: String,
    },
}

/// One immutable content database, shared by every reader of a given
/// activation.
///
/// Readers hold an `Arc<ContentSnapshot>` for the duration of a call, so a
/// swap never changes the rows a call sees. Once retired, the snapshot
/// directory is deleted when the last holder drops it.
#[derive(Debug)]
pub struct ContentSnapshot {
    dir: Utf8PathBuf,
    version: ContentVersion,
    idle: Mutex<Vec<Connection>>,
    retired: AtomicBool,
}

impl ContentSnapshot {
    /// Open the snapshot stored in `dir` and check its metadata.
    ///
    /// # Errors
    /// Returns [`SnapshotError`] when the database cannot be opened, uses
    /// another schema version, or lacks its version metadata.
    pub fn open(dir: impl Into<Utf8PathBuf>) -> Result<Self, SnapshotError> {
        let dir = dir.into();
        let db_path = dir.join(CONTENT_DB_FILE);
        let connection = connect(&db_path)?;
        let version = read_version(&connection, &db_path)?;
        debug!(
            "opened content snapshot {} (sequence {})",
            version.version, version.sequence
        );
        Ok(Self {
            dir,
            version,
            idle: Mutex::new(vec![connection]),
            retired: AtomicBool::new(false),
        })
    }

    /// Directory holding the snapshot files.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Pack version and sequence that produced the snapshot.
    #[must_use]
    pub const fn version(&self) -> &ContentVersion {
        &self.version
    }

    /// Run `read` against a read-only connection to this snapshot.
    ///
    /// # Errors
    /// Returns the error produced by `read`, or a [`SnapshotError`] when no
    /// connection can be opened.
    pub fn with_connection<T, E>(
        &self,
        read: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<SnapshotError>,
    {
        let pooled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let connection = match pooled {
            Some(connection) => connection,
            None => connect(&self.dir.join(CONTENT_DB_FILE))?,
        };
        let result = read(&connection);
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(connection);
        }
        result
    }

    /// Mark the snapshot for deletion once the last reader releases it.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Whether the snapshot has been replaced.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

impl Drop for ContentSnapshot {
    fn drop(&mut self) {
        if !self.is_retired() {
            return;
        }
        // Close every handle before deleting the files underneath them.
        self.idle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        match compass_fs::remove_dir_all_if_exists(&self.dir) {
            Ok(()) => info!(
                "removed retired content snapshot {} (sequence {})",
                self.version.version, self.version.sequence
            ),
            Err(err) => warn!("failed to remove retired snapshot {}: {err}", self.dir),
        }
    }
}

fn connect(db_path: &Utf8Path) -> Result<Connection, SnapshotError> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| SnapshotError::Open {
        path: db_path.to_owned(),
        source,
    })
}

fn read_version(connection: &Connection, db_path: &Utf8Path) -> Result<ContentVersion, SnapshotError> {
    let meta = |key: &'static str| {
        read_meta(connection, key).map_err(|source| SnapshotError::Meta {
            path: db_path.to_owned(),
            key,
            source,
        })
    };
    let invalid = |key: &'static str| SnapshotError::InvalidMeta {
        path: db_path.to_owned(),
        key,
    };

    let schema = meta(META_SCHEMA_VERSION)?.unwrap_or_default();
    if schema.parse::<i64>().ok() != Some(CONTENT_SCHEMA_VERSION) {
        return Err(SnapshotError::SchemaVersion {
            path: db_path.to_owned(),
            expected: CONTENT_SCHEMA_VERSION,
            found: schema,
        });
    }
    let version = meta(META_VERSION)?.ok_or_else(|| invalid(META_VERSION))?;
    let sequence = meta(META_SEQUENCE)?
        .and_then(|text| text.parse::<u64>().ok())
        .ok_or_else(|| invalid(META_SEQUENCE))?;
    Ok(ContentVersion { version, sequence })
}
