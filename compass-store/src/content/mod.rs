//! The active content snapshot and its on-disk home.
//!
//! [`ContentStore`] owns the pointer to the snapshot currently serving reads.
//! Readers clone the `Arc` once per call; activation swaps the pointer under
//! a write lock, so every call sees exactly one snapshot.

mod layout;
mod pointer;
mod snapshot;

#[cfg(test)]
mod tests;

use std::io;
use std::sync::{Arc, PoisonError, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::ContentVersion;
use log::{info, warn};
use thiserror::Error;

pub use layout::{ContentLayout, POINTER_FILE, is_safe_component, snapshot_name};
pub use pointer::ActivePointer;
pub use snapshot::{ContentSnapshot, SnapshotError};

/// Errors raised while opening or switching the content area.
#[derive(Debug, Error)]
pub enum ContentStoreError {
    /// A filesystem operation failed.
    #[error("failed to {operation} at {path}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The pointer file is not valid JSON.
    #[error("active pointer at {path} is malformed")]
    Pointer {
        /// Pointer path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The pointer names a directory that is not a plain snapshot name.
    #[error("active pointer names invalid snapshot directory '{dir}'")]
    InvalidPointerTarget {
        /// Directory named by the pointer.
        dir: String,
    },
    /// The snapshot named by the pointer cannot be used.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Owner of the active content snapshot.
#[derive(Debug)]
pub struct ContentStore {
    layout: ContentLayout,
    active: RwLock<Option<Arc<ContentSnapshot>>>,
}

impl ContentStore {
    /// Open the content area rooted at `root`, creating it when missing.
    ///
    /// Leftover staging directories from an interrupted install are removed,
    /// as are snapshot directories the pointer does not name.
    ///
    /// # Errors
    /// Returns [`ContentStoreError`] when the directories cannot be prepared
    /// or the snapshot named by the pointer cannot be opened.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, ContentStoreError> {
        let layout = ContentLayout::new(root);
        for dir in [
            layout.snapshots_dir(),
            layout.staging_root(),
            layout.quarantine_root(),
        ] {
            compass_fs::ensure_dir(&dir).map_err(|source| ContentStoreError::Io {
                operation: "create content directory",
                path: dir.clone(),
                source,
            })?;
        }
        clear_children(&layout.staging_root(), None)?;

        let pointer = ActivePointer::read(&layout.pointer_path())?;
        let active = load_active(&layout, pointer.as_ref())?;
        clear_children(
            &layout.snapshots_dir(),
            pointer.as_ref().map(|p| p.dir.as_str()),
        )?;

        Ok(Self {
            layout,
            active: RwLock::new(active),
        })
    }

    /// Open the content area at `root` for inspection only.
    ///
    /// Nothing is created or removed, so an install running in another
    /// process keeps its staging directory. A missing area has no active
    /// snapshot.
    ///
    /// # Errors
    /// Returns [`ContentStoreError`] when the pointer is malformed or the
    /// snapshot it names cannot be opened.
    pub fn open_read_only(root: impl Into<Utf8PathBuf>) -> Result<Self, ContentStoreError> {
        let layout = ContentLayout::new(root);
        let pointer = ActivePointer::read(&layout.pointer_path())?;
        let active = load_active(&layout, pointer.as_ref())?;
        Ok(Self {
            layout,
            active: RwLock::new(active),
        })
    }

    /// Directory layout of the content area.
    #[must_use]
    pub const fn layout(&self) -> &ContentLayout {
        &self.layout
    }

    /// The snapshot serving reads right now, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ContentSnapshot>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Version of the active snapshot, if any.
    #[must_use]
    pub fn active_version(&self) -> Option<ContentVersion> {
        self.current().map(|snapshot| snapshot.version().clone())
    }

    /// Make `snapshot` the one serving reads and return the one it replaced.
    pub(crate) fn publish(&self, snapshot: Arc<ContentSnapshot>) -> Option<Arc<ContentSnapshot>> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.replace(snapshot)
    }

    /// Point the on-disk pointer at `snapshot`.
    pub(crate) fn write_pointer(&self, snapshot: &ContentSnapshot) -> Result<(), ContentStoreError> {
        let dir = snapshot
            .dir()
            .file_name()
            .ok_or_else(|| ContentStoreError::InvalidPointerTarget {
                dir: snapshot.dir().to_string(),
            })?
            .to_owned();
        ActivePointer {
            version: snapshot.version().version.clone(),
            sequence: snapshot.version().sequence,
            dir,
        }
        .write(&self.layout.pointer_path())
    }
}

fn load_active(
    layout: &ContentLayout,
    pointer: Option<&ActivePointer>,
) -> Result<Option<Arc<ContentSnapshot>>, ContentStoreError> {
    let Some(pointer) = pointer else {
        info!("no content snapshot is active yet");
        return Ok(None);
    };
    if !is_safe_component(&pointer.dir) {
        return Err(ContentStoreError::InvalidPointerTarget {
            dir: pointer.dir.clone(),
        });
    }
    let snapshot = ContentSnapshot::open(layout.snapshot_dir(&pointer.dir))?;
    info!(
        "content snapshot {} (sequence {}) is active",
        snapshot.version().version,
        snapshot.version().sequence
    );
    Ok(Some(Arc::new(snapshot)))
}

fn clear_children(dir: &Utf8Path, keep: Option<&str>) -> Result<(), ContentStoreError> {
    let names = compass_fs::list_dir_names(dir).map_err(|source| ContentStoreError::Io {
        operation: "list content directory",
        path: dir.to_owned(),
        source,
    })?;
    for name in names.into_iter().filter(|name| Some(name.as_str()) != keep) {
        let path = dir.join(&name);
        match compass_fs::remove_dir_all_if_exists(&path) {
            Ok(()) => info!("removed leftover content directory {path}"),
            Err(err) => warn!("failed to remove leftover content directory {path}: {err}"),
        }
    }
    Ok(())
}
