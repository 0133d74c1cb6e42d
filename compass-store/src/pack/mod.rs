//! Content pack installation: verify, stage, activate.
//!
//! [`ContentSwapManager::install`] drives one pack through
//! `pending → downloading → verifying → ready → active`. Everything up to
//! `ready` happens in a staging directory the repository never reads, so
//! cancelling or failing there has no visible effect. Activation renames the
//! staged snapshot into place, replaces the `ACTIVE` pointer file and then
//! publishes the snapshot in memory; a failure at any of those steps leaves
//! the previous snapshot active.

mod build;
mod delta;
mod state;
mod verify;
mod writer;

use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::{AppVersion, ContentManifest, ContentVersion, DownloadState, PackType};
use log::{info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::content::{
    ContentSnapshot, ContentStore, ContentStoreError, SnapshotError, is_safe_component,
    snapshot_name,
};
use crate::schema::SchemaError;
use crate::user::{UserDataError, UserDatabase};

pub use delta::DeltaSummary;
pub use state::PackState;
pub use verify::{KeyRing, KeyRingError, VerifyError, file_sha256, manifest_checksum, verify_pack};
pub use writer::{
    ContentBundle, PackDraft, PackSigner, PackWriteError, seal_pack, write_content_database,
};

use self::state::StateTracker;

/// File name of the manifest inside a pack or snapshot directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors raised while installing a pack.
#[derive(Debug, Error)]
pub enum SwapError {
    /// The pack id cannot be used as a directory name.
    #[error("pack id '{pack_id}' is not a plain identifier")]
    InvalidPackId {
        /// Rejected id.
        pack_id: String,
    },
    /// The pack version cannot be used in a directory name.
    #[error("pack version '{version}' is not a plain identifier")]
    InvalidVersion {
        /// Rejected version.
        version: String,
    },
    /// The manifest file could not be parsed or written.
    #[error("pack manifest at {path} is malformed")]
    Manifest {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A filesystem operation failed.
    #[error("failed to {operation} at {path}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Checksum or signature verification failed.
    #[error(transparent)]
    Verify(#[from] VerifyError),
    /// A delta pack does not apply to the active version.
    #[error(
        "delta pack applies to {accepted:?} but the active version is {}; a full pack is required",
        active.as_deref().unwrap_or("none")
    )]
    DeltaMismatch {
        /// Active version, if any.
        active: Option<String>,
        /// Versions the delta accepts.
        accepted: Vec<String>,
    },
    /// A delta database uses another schema version.
    #[error("delta pack has content schema version '{found}'")]
    DeltaSchema {
        /// Recorded schema version.
        found: String,
    },
    /// Building the staged database failed.
    #[error("failed to {operation} while staging the pack")]
    Build {
        /// Step description.
        operation: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// The staged content has dangling or untranslated rows.
    #[error("pack content is inconsistent: {}", problems.join("; "))]
    InvalidContent {
        /// Human-readable problems.
        problems: Vec<String>,
    },
    /// The staged schema could not be checked or its index rebuilt.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The staged snapshot could not be opened.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// The active pointer could not be replaced.
    #[error(transparent)]
    Store(#[from] ContentStoreError),
    /// Quarantine bookkeeping failed.
    #[error(transparent)]
    User(#[from] UserDataError),
}

/// A pack on disk, ready to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSource {
    /// Download identifier; names staging and quarantine directories.
    pub pack_id: String,
    /// Parsed manifest.
    pub manifest: ContentManifest,
    /// Directory holding the pack files.
    pub dir: Utf8PathBuf,
}

impl PackSource {
    /// Read `manifest.json` from `dir`.
    ///
    /// # Errors
    /// Returns [`SwapError::Io`] when the manifest is missing or unreadable
    /// and [`SwapError::Manifest`] when it is malformed.
    pub fn load(pack_id: impl Into<String>, dir: impl Into<Utf8PathBuf>) -> Result<Self, SwapError> {
        let dir = dir.into();
        let path = dir.join(MANIFEST_FILE);
        let text = compass_fs::read_optional_string(&path)
            .and_then(|text| {
                text.ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
            })
            .map_err(|source| SwapError::Io {
                operation: "read pack manifest",
                path: path.clone(),
                source,
            })?;
        let manifest =
            serde_json::from_str(&text).map_err(|source| SwapError::Manifest { path, source })?;
        Ok(Self {
            pack_id: pack_id.into(),
            manifest,
            dir,
        })
    }
}

/// How an install attempt ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The pack now serves reads.
    Activated(ContentVersion),
    /// The pack is not newer than the active one; nothing changed.
    Stale {
        /// Sequence of the offered pack.
        offered: u64,
        /// Sequence of the active pack.
        active: u64,
    },
    /// The pack needs a newer app; it is kept in quarantine for retry.
    Incompatible {
        /// Minimum version the pack requires.
        required: AppVersion,
        /// Version of the running app.
        running: AppVersion,
    },
    /// Cancelled before activation began; nothing changed.
    Cancelled,
}

/// Result of retrying one quarantined pack.
#[derive(Debug)]
pub struct QuarantineRetry {
    /// Quarantined pack id.
    pub pack_id: String,
    /// What the retry produced.
    pub outcome: Result<InstallOutcome, SwapError>,
}

/// Installs content packs into a [`ContentStore`].
///
/// Installs are serialised; reads through the repository continue against
/// the active snapshot throughout.
pub struct ContentSwapManager {
    store: Arc<ContentStore>,
    user: Arc<UserDatabase>,
    keys: KeyRing,
    app_version: AppVersion,
    install_lock: Mutex<()>,
}

impl std::fmt::Debug for ContentSwapManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSwapManager")
            .field("store", &self.store)
            .field("keys", &self.keys.len())
            .field("app_version", &self.app_version)
            .finish_non_exhaustive()
    }
}

impl ContentSwapManager {
    /// Manager for `store` that trusts `keys` and runs as `app_version`.
    #[must_use]
    pub const fn new(
        store: Arc<ContentStore>,
        user: Arc<UserDatabase>,
        keys: KeyRing,
        app_version: AppVersion,
    ) -> Self {
        Self {
            store,
            user,
            keys,
            app_version,
            install_lock: Mutex::new(()),
        }
    }

    /// Install `bundled` when no snapshot is active yet.
    ///
    /// Returns `None` when content is already active.
    ///
    /// # Errors
    /// As for [`Self::install`].
    pub fn bootstrap(&self, bundled: &PackSource) -> Result<Option<InstallOutcome>, SwapError> {
        if self.store.current().is_some() {
            return Ok(None);
        }
        info!("no content is active; installing bundled pack {}", bundled.pack_id);
        self.install(bundled, &CancellationToken::new()).map(Some)
    }

    /// Verify, stage and activate `source`.
    ///
    /// `cancel` is honoured until activation begins; after that the install
    /// either completes or rolls back.
    ///
    /// # Errors
    /// Returns [`SwapError`] for verification failures, delta mismatches and
    /// I/O failures. The pack is marked failed and the active snapshot is
    /// unchanged in every error case.
    pub fn install(
        &self,
        source: &PackSource,
        cancel: &CancellationToken,
    ) -> Result<InstallOutcome, SwapError> {
        let _guard = self
            .install_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let manifest = &source.manifest;
        if !is_safe_component(&source.pack_id) {
            return Err(SwapError::InvalidPackId {
                pack_id: source.pack_id.clone(),
            });
        }
        if !is_safe_component(&manifest.version) {
            return Err(SwapError::InvalidVersion {
                version: manifest.version.clone(),
            });
        }

        let mut tracker = StateTracker::start(&self.user, &source.pack_id);
        let result = self.install_tracked(source, cancel, &mut tracker);
        if let Err(err) = &result {
            warn!("install of pack {} failed: {err}", source.pack_id);
            if !tracker.state().is_terminal() {
                tracker.advance(PackState::Failed, Some(&err.to_string()));
            }
        }
        result
    }

    fn install_tracked(
        &self,
        source: &PackSource,
        cancel: &CancellationToken,
        tracker: &mut StateTracker<'_>,
    ) -> Result<InstallOutcome, SwapError> {
        let manifest = &source.manifest;
        tracker.advance(PackState::Verifying, None);
        verify_pack(manifest, &source.dir, &self.keys)?;

        if !manifest.is_compatible_with(self.app_version) {
            self.quarantine(source)?;
            let message = format!(
                "requires app {} or newer; running {}",
                manifest.min_app_version, self.app_version
            );
            info!("pack {} parked: {message}", source.pack_id);
            tracker.advance(PackState::Incompatible, None);
            tracker.advance(PackState::Pending, Some(&message));
            return Ok(InstallOutcome::Incompatible {
                required: manifest.min_app_version,
                running: self.app_version,
            });
        }

        let active = self.store.current();
        if let Some(current) = &active
            && manifest.sequence <= current.version().sequence
        {
            let message = format!(
                "sequence {} is not newer than active sequence {}",
                manifest.sequence,
                current.version().sequence
            );
            info!("ignoring stale pack {}: {message}", source.pack_id);
            tracker.advance(PackState::Failed, Some(&message));
            return Ok(InstallOutcome::Stale {
                offered: manifest.sequence,
                active: current.version().sequence,
            });
        }

        if manifest.is_delta() {
            let active_version = active.as_ref().map(|s| s.version().version.clone());
            if !active_version
                .as_deref()
                .is_some_and(|version| manifest.applies_to(version))
            {
                return Err(SwapError::DeltaMismatch {
                    active: active_version,
                    accepted: manifest.delta_from.clone().unwrap_or_default(),
                });
            }
        }

        if cancel.is_cancelled() {
            return Ok(Self::cancelled(source, tracker));
        }
        let staging = build::build_staging(self.store.layout(), source, active.as_deref())?;
        tracker.advance(PackState::Ready, None);
        if cancel.is_cancelled() {
            build::discard(&staging);
            return Ok(Self::cancelled(source, tracker));
        }
        drop(active);

        let version = self.activate(manifest, &staging)?;
        tracker.advance(PackState::Active, None);
        info!(
            "content pack {} (sequence {}) is now active",
            version.version, version.sequence
        );
        Ok(InstallOutcome::Activated(version))
    }

    fn cancelled(source: &PackSource, tracker: &mut StateTracker<'_>) -> InstallOutcome {
        info!("install of pack {} cancelled", source.pack_id);
        tracker.advance(PackState::Pending, Some("cancelled"));
        InstallOutcome::Cancelled
    }

    /// Move the staged snapshot into place and make it the active one.
    fn activate(
        &self,
        manifest: &ContentManifest,
        staging: &Utf8Path,
    ) -> Result<ContentVersion, SwapError> {
        let layout = self.store.layout();
        let target = layout.snapshot_dir(&snapshot_name(manifest.sequence, &manifest.version));
        let moved = compass_fs::remove_dir_all_if_exists(&target)
            .and_then(|()| compass_fs::rename(staging, &target));
        if let Err(source) = moved {
            build::discard(staging);
            return Err(SwapError::Io {
                operation: "move staged snapshot into place",
                path: target,
                source,
            });
        }

        let snapshot = match ContentSnapshot::open(target.clone()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                build::discard(&target);
                return Err(err.into());
            }
        };
        if let Err(err) = self.store.write_pointer(&snapshot) {
            // Retiring deletes the directory once `snapshot` drops.
            snapshot.retire();
            return Err(err.into());
        }

        let version = snapshot.version().clone();
        if let Some(previous) = self.store.publish(Arc::new(snapshot)) {
            previous.retire();
        }
        Ok(version)
    }

    fn quarantine(&self, source: &PackSource) -> Result<(), SwapError> {
        let parked = self.store.layout().quarantine_dir(&source.pack_id);
        if source.dir == parked {
            return Ok(());
        }
        let io = |operation: &'static str, path: Utf8PathBuf| {
            move |source: std::io::Error| SwapError::Io {
                operation,
                path,
                source,
            }
        };
        compass_fs::remove_dir_all_if_exists(&parked)
            .and_then(|()| compass_fs::ensure_dir(&parked))
            .map_err(io("prepare quarantine directory", parked.clone()))?;
        let names = source
            .manifest
            .pack_checksums
            .keys()
            .map(String::as_str)
            .chain([MANIFEST_FILE]);
        for name in names {
            compass_fs::copy_file(&source.dir.join(name), &parked.join(name))
                .map_err(io("quarantine pack file", source.dir.join(name)))?;
        }
        Ok(())
    }

    /// Retry every quarantined pack against the running app version.
    ///
    /// Packs that activate, turn out stale or fail are removed from
    /// quarantine; packs still too new stay parked.
    ///
    /// # Errors
    /// Returns [`SwapError::Io`] when the quarantine directory cannot be
    /// listed; per-pack failures are reported in the result.
    pub fn retry_quarantined(&self) -> Result<Vec<QuarantineRetry>, SwapError> {
        let root = self.store.layout().quarantine_root();
        let names = compass_fs::list_dir_names(&root).map_err(|source| SwapError::Io {
            operation: "list quarantined packs",
            path: root.clone(),
            source,
        })?;
        let mut results = Vec::with_capacity(names.len());
        for pack_id in names {
            let dir = root.join(&pack_id);
            let outcome = PackSource::load(pack_id.clone(), dir.clone())
                .and_then(|source| self.install(&source, &CancellationToken::new()));
            if !matches!(outcome, Ok(InstallOutcome::Incompatible { .. })) {
                build::discard(&dir);
            }
            results.push(QuarantineRetry { pack_id, outcome });
        }
        Ok(results)
    }

    /// Record that a pack is known but not yet downloaded.
    ///
    /// # Errors
    /// Returns [`SwapError::User`] when the status cannot be written.
    pub fn mark_pending(&self, pack_id: &str) -> Result<(), SwapError> {
        self.user
            .set_download_state(pack_id, PackType::Content, DownloadState::Pending, None)?;
        Ok(())
    }

    /// Record download progress for a pack.
    ///
    /// # Errors
    /// Returns [`SwapError::User`] when the status cannot be written.
    pub fn record_progress(
        &self,
        pack_id: &str,
        downloaded_bytes: u64,
        size_bytes: Option<u64>,
    ) -> Result<(), SwapError> {
        self.user
            .record_download_progress(pack_id, PackType::Content, downloaded_bytes, size_bytes)?;
        Ok(())
    }

    /// The running application version.
    #[must_use]
    pub const fn app_version(&self) -> AppVersion {
        self.app_version
    }
}

#[cfg(test)]
mod tests;
