//! Test helpers for composing pack directories, keys and data directories.

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::test_support::{instant, place_base, place_text};
use compass_core::{AppVersion, Locale, PlaceCategory};
use compass_store::pack::{ContentBundle, PackSigner};
use tempfile::TempDir;

use crate::pack::SealConfig;

const SECRET: [u8; 32] = [9; 32];

/// Scratch directory holding a secret key, a trusted key file and a JSON
/// content bundle.
pub(super) struct Publisher {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Publisher {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        let signer = PackSigner::from_bytes(&SECRET, 0);
        write_utf8(&root.join("secret.key"), hex::encode(SECRET).as_bytes());
        let keys = format!(
            "# release key\n{}\n",
            hex::encode(signer.verifying_key().as_bytes())
        );
        write_utf8(&root.join("trusted.keys"), keys.as_bytes());
        let bundle = serde_json::to_vec(&bundle()).expect("serialise bundle");
        write_utf8(&root.join("bundle.json"), &bundle);
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn keys(&self) -> Utf8PathBuf {
        self.root.join("trusted.keys")
    }

    pub(super) fn data_dir(&self) -> Utf8PathBuf {
        self.root.join("data")
    }

    /// Seal configuration building `packs/<name>` from the bundle.
    pub(super) fn seal_config(&self, name: &str, sequence: u64) -> SealConfig {
        SealConfig {
            pack_dir: self.root.join("packs").join(name),
            bundle: Some(self.root.join("bundle.json")),
            version: format!("2026.06.{sequence}"),
            sequence,
            min_app_version: AppVersion::new(1, 0, 0),
            delta_from: None,
            secret_key: self.root.join("secret.key"),
            key_index: 0,
        }
    }
}

pub(super) fn published_at() -> chrono::DateTime<chrono::Utc> {
    instant("2026-06-01T08:00:00Z").expect("instant")
}

fn bundle() -> ContentBundle {
    ContentBundle {
        places: vec![
            place_base("le-jardin", PlaceCategory::Restaurant),
            place_base("maison-de-la-photographie", PlaceCategory::Museum),
        ],
        place_texts: vec![
            place_text("le-jardin", Locale::En, "Le Jardin", "Courtyard tagine under banana trees"),
            place_text("le-jardin", Locale::Fr, "Le Jardin", "Tajine dans un patio verdoyant"),
            place_text(
                "maison-de-la-photographie",
                Locale::En,
                "Maison de la Photographie",
                "Early photographs of Morocco",
            ),
        ],
        ..ContentBundle::default()
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    compass_fs::write_file_atomically(path, contents).expect("write fixture file");
}
