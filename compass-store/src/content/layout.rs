use camino::{Utf8Path, Utf8PathBuf};

/// Name of the pointer file naming the active snapshot.
pub const POINTER_FILE: &str = "ACTIVE";

/// Directory layout of the content area.
///
/// ```text
/// <root>/ACTIVE
/// <root>/snapshots/<sequence>-<version>/content.db
/// <root>/staging/<pack-id>/
/// <root>/quarantine/<pack-id>/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    root: Utf8PathBuf,
}

impl ContentLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Content area root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Pointer file path.
    #[must_use]
    pub fn pointer_path(&self) -> Utf8PathBuf {
        self.root.join(POINTER_FILE)
    }

    /// Directory holding every snapshot.
    #[must_use]
    pub fn snapshots_dir(&self) -> Utf8PathBuf {
        self.root.join("snapshots")
    }

    /// Directory of one snapshot.
    #[must_use]
    pub fn snapshot_dir(&self, name: &str) -> Utf8PathBuf {
        self.snapshots_dir().join(name)
    }

    /// Directory holding in-flight installs.
    #[must_use]
    pub fn staging_root(&self) -> Utf8PathBuf {
        self.root.join("staging")
    }

    /// Staging directory for one pack.
    #[must_use]
    pub fn staging_dir(&self, pack_id: &str) -> Utf8PathBuf {
        self.staging_root().join(pack_id)
    }

    /// Directory holding packs parked until the app updates.
    #[must_use]
    pub fn quarantine_root(&self) -> Utf8PathBuf {
        self.root.join("quarantine")
    }

    /// Quarantine directory for one pack.
    #[must_use]
    pub fn quarantine_dir(&self, pack_id: &str) -> Utf8PathBuf {
        self.quarantine_root().join(pack_id)
    }
}

/// Directory name of the snapshot for a pack.
#[must_use]
pub fn snapshot_name(sequence: u64, version: &str) -> String {
    format!("{sequence}-{version}")
}

/// Whether `name` can be used as a single path component.
///
/// Pack ids, versions and pack file names end up in paths, so they are
/// limited to ASCII letters, digits, `.`, `_` and `-`, and may not start with
/// a dot.
#[must_use]
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2026.06.1", true)]
    #[case("pack_01-full", true)]
    #[case("", false)]
    #[case("..", false)]
    #[case(".hidden", false)]
    #[case("a/b", false)]
    #[case("naïve", false)]
    fn accepts_only_plain_components(#[case] name: &str, #[case] safe: bool) {
        assert_eq!(is_safe_component(name), safe);
    }

    #[rstest]
    fn snapshot_dirs_sort_under_snapshots() {
        let layout = ContentLayout::new("/data/content");
        assert_eq!(
            layout.snapshot_dir(&snapshot_name(5, "2026.06.1")),
            Utf8PathBuf::from("/data/content/snapshots/5-2026.06.1")
        );
        assert_eq!(
            layout.pointer_path(),
            Utf8PathBuf::from("/data/content/ACTIVE")
        );
    }
}
