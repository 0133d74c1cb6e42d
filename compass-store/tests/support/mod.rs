//! Shared fixtures for the store integration tests: a scratch data
//! directory, a signing key and helpers that seal packs into it.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::test_support::{instant, place_base, place_text};
use compass_core::{
    AppVersion, CONTENT_DB_FILE, ContentRef, ContentType, FixedClock, Locale, PlaceCategory,
};
use compass_store::pack::{
    ContentBundle, PackDraft, PackSigner, PackSource, seal_pack, write_content_database,
};
use compass_store::{DataLayer, KeyRing, StoreConfig};
use tempfile::TempDir;

/// Secret key the fixtures sign with.
pub const SECRET: [u8; 32] = [42; 32];

/// Version the fixture app reports unless a test overrides it.
pub const RUNNING: AppVersion = AppVersion::new(1, 2, 0);

/// A data directory with its data layer opened.
pub struct Workspace {
    guard: TempDir,
    pub layer: DataLayer,
}

impl Workspace {
    /// Open a fresh data directory running as `app_version`.
    pub fn new(app_version: AppVersion) -> Self {
        let guard = tempfile::tempdir().expect("temp dir");
        let layer = open_layer(&data_dir(&guard), app_version);
        Self { guard, layer }
    }

    /// Reopen the same directory, as the app does after a restart or update.
    pub fn reopen(&mut self, app_version: AppVersion) {
        self.layer = open_layer(&data_dir(&self.guard), app_version);
    }

    /// Root of the scratch directory.
    pub fn root(&self) -> Utf8PathBuf {
        data_dir(&self.guard)
    }

    /// Write and seal a pack under `incoming/<name>`.
    pub fn pack(&self, name: &str, draft: &PackDraft, bundle: &ContentBundle) -> PackSource {
        let dir = self.root().join("incoming").join(name);
        write_content_database(&dir.join(CONTENT_DB_FILE), draft, bundle).expect("write pack");
        seal_pack(&dir, draft, &signer()).expect("seal pack");
        PackSource::load(name, dir).expect("load pack")
    }

    /// Names of the snapshot directories on disk.
    pub fn snapshot_dirs(&self) -> Vec<String> {
        let dir = self.layer.content_root().join("snapshots");
        let mut names = compass_fs::list_dir_names(&dir).expect("list snapshots");
        names.sort();
        names
    }
}

fn data_dir(guard: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(guard.path().join("data")).expect("utf-8 path")
}

fn open_layer(data_dir: &Utf8Path, app_version: AppVersion) -> DataLayer {
    let config = StoreConfig {
        data_dir: data_dir.to_owned(),
        app_version,
        keys: keys(),
    };
    let clock = Arc::new(FixedClock(
        instant("2026-06-10T10:00:00Z").expect("instant"),
    ));
    DataLayer::init_with_clock(config, clock).expect("open data layer")
}

/// The fixture signer, registered as key 0.
pub fn signer() -> PackSigner {
    PackSigner::from_bytes(&SECRET, 0)
}

/// Key ring trusting only [`signer`].
pub fn keys() -> KeyRing {
    KeyRing::new(vec![signer().verifying_key()])
}

/// Draft for a full pack.
pub fn full_draft(version: &str, sequence: u64, min_app: AppVersion) -> PackDraft {
    PackDraft {
        version: version.to_owned(),
        sequence,
        published_at: instant("2026-06-01T08:00:00Z").expect("instant"),
        min_app_version: min_app,
        delta_from: None,
    }
}

/// Draft for a delta pack applying to `from`.
pub fn delta_draft(version: &str, sequence: u64, from: &[&str]) -> PackDraft {
    PackDraft {
        delta_from: Some(from.iter().map(|v| (*v).to_owned()).collect()),
        ..full_draft(version, sequence, AppVersion::new(1, 0, 0))
    }
}

/// Places with English text, plus French text for each id in `french`.
///
/// Names are `<id> (<locale>)` so tests can tell locales apart.
pub fn places_bundle(ids: &[&str], french: &[&str]) -> ContentBundle {
    let places = ids
        .iter()
        .map(|id| place_base(id, PlaceCategory::Restaurant))
        .collect();
    let english = ids.iter().map(|id| {
        place_text(id, Locale::En, &format!("{id} (en)"), "Tagine and mint tea")
    });
    let french_texts = french.iter().map(|id| {
        place_text(id, Locale::Fr, &format!("{id} (fr)"), "Tajine et thé à la menthe")
    });
    ContentBundle {
        places,
        place_texts: english.chain(french_texts).collect(),
        ..ContentBundle::default()
    }
}

/// Tombstone for a place.
pub fn removed_place(id: &str) -> ContentRef {
    ContentRef::new(ContentType::Place, id)
}
