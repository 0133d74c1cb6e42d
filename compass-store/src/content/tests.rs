//! Tests for the content area: pointer recovery, orphan cleanup and
//! snapshot retirement.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::CONTENT_DB_FILE;
use rstest::{fixture, rstest};
use rusqlite::Connection;
use tempfile::TempDir;

use super::*;
use crate::schema::{META_SEQUENCE, META_VERSION, initialise_content_schema, write_meta};

struct Area {
    _guard: TempDir,
    root: Utf8PathBuf,
}

#[fixture]
fn area() -> Area {
    let guard = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(guard.path().join("content")).expect("utf-8 path");
    Area {
        _guard: guard,
        root,
    }
}

fn write_snapshot(dir: &Utf8Path, version: &str, sequence: u64) {
    compass_fs::ensure_dir(dir).expect("create snapshot dir");
    let mut conn = Connection::open(dir.join(CONTENT_DB_FILE)).expect("create content db");
    initialise_content_schema(&mut conn).expect("content schema");
    write_meta(&conn, META_VERSION, version).expect("version meta");
    write_meta(&conn, META_SEQUENCE, &sequence.to_string()).expect("sequence meta");
}

fn install_active(layout: &ContentLayout, version: &str, sequence: u64) -> String {
    let name = snapshot_name(sequence, version);
    write_snapshot(&layout.snapshot_dir(&name), version, sequence);
    ActivePointer {
        version: version.to_owned(),
        sequence,
        dir: name.clone(),
    }
    .write(&layout.pointer_path())
    .expect("write pointer");
    name
}

#[rstest]
fn empty_area_has_no_active_snapshot(area: Area) {
    let store = ContentStore::open(area.root.clone()).expect("open store");
    assert!(store.current().is_none());
    assert!(store.layout().snapshots_dir().is_dir());
    assert!(store.layout().staging_root().is_dir());
}

#[rstest]
fn pointer_selects_the_active_snapshot(area: Area) {
    let layout = ContentLayout::new(area.root.clone());
    install_active(&layout, "2026.06.1", 5);

    let store = ContentStore::open(area.root.clone()).expect("open store");
    let version = store.active_version().expect("active version");
    assert_eq!(version.version, "2026.06.1");
    assert_eq!(version.sequence, 5);
}

#[rstest]
fn leftovers_from_interrupted_installs_are_removed(area: Area) {
    let layout = ContentLayout::new(area.root.clone());
    let active = install_active(&layout, "2026.06.1", 5);
    let orphan = layout.snapshot_dir(&snapshot_name(6, "2026.07.0"));
    write_snapshot(&orphan, "2026.07.0", 6);
    let staging = layout.staging_dir("content-2026.07.0");
    compass_fs::ensure_dir(&staging).expect("staging dir");

    let _store = ContentStore::open(area.root.clone()).expect("open store");
    assert!(!orphan.exists());
    assert!(!staging.exists());
    assert!(layout.snapshot_dir(&active).is_dir());
}

#[rstest]
fn quarantined_packs_survive_reopening(area: Area) {
    let layout = ContentLayout::new(area.root.clone());
    let parked = layout.quarantine_dir("content-2027.01.0");
    compass_fs::ensure_dir(&parked).expect("quarantine dir");

    let _store = ContentStore::open(area.root.clone()).expect("open store");
    assert!(parked.is_dir());
}

#[rstest]
fn pointer_escaping_the_snapshot_dir_is_rejected(area: Area) {
    let layout = ContentLayout::new(area.root.clone());
    compass_fs::ensure_dir(&area.root).expect("root dir");
    ActivePointer {
        version: "x".to_owned(),
        sequence: 1,
        dir: "../../etc".to_owned(),
    }
    .write(&layout.pointer_path())
    .expect("write pointer");

    let err = ContentStore::open(area.root.clone()).expect_err("unsafe pointer");
    assert!(matches!(err, ContentStoreError::InvalidPointerTarget { .. }));
}

#[rstest]
fn malformed_pointer_is_reported(area: Area) {
    compass_fs::ensure_dir(&area.root).expect("root dir");
    compass_fs::write_file_atomically(&area.root.join(POINTER_FILE), b"not json")
        .expect("write pointer");
    let err = ContentStore::open(area.root.clone()).expect_err("malformed pointer");
    assert!(matches!(err, ContentStoreError::Pointer { .. }));
}

#[rstest]
fn snapshot_with_wrong_schema_version_is_refused(area: Area) {
    let dir = area.root.join("legacy");
    write_snapshot(&dir, "2025.01.0", 1);
    let conn = Connection::open(dir.join(CONTENT_DB_FILE)).expect("open db");
    write_meta(&conn, crate::schema::META_SCHEMA_VERSION, "1").expect("downgrade meta");
    drop(conn);

    let err = ContentSnapshot::open(dir).expect_err("schema mismatch");
    assert!(matches!(err, SnapshotError::SchemaVersion { .. }));
}

#[rstest]
fn retired_snapshot_is_deleted_after_the_last_reader(area: Area) {
    let dir = area.root.join("snapshots/1-2026.01.0");
    write_snapshot(&dir, "2026.01.0", 1);
    let snapshot = Arc::new(ContentSnapshot::open(dir.clone()).expect("open snapshot"));
    let reader = Arc::clone(&snapshot);

    snapshot.retire();
    drop(snapshot);
    let count: i64 = reader
        .with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM places_base", [], |row| row.get(0))
                .map_err(|source| SnapshotError::Open {
                    path: dir.clone(),
                    source,
                })
        })
        .expect("read while retired");
    assert_eq!(count, 0);
    assert!(dir.is_dir());

    drop(reader);
    assert!(!dir.exists());
}

#[rstest]
fn publishing_returns_the_replaced_snapshot(area: Area) {
    let store = ContentStore::open(area.root.clone()).expect("open store");
    let dir = store.layout().snapshot_dir(&snapshot_name(2, "2026.02.0"));
    write_snapshot(&dir, "2026.02.0", 2);
    let first = Arc::new(ContentSnapshot::open(dir).expect("open snapshot"));

    assert!(store.publish(Arc::clone(&first)).is_none());
    store.write_pointer(&first).expect("write pointer");
    let reopened = ContentStore::open(area.root.clone()).expect("reopen store");
    assert_eq!(
        reopened.active_version().map(|v| v.sequence),
        Some(2)
    );
}

#[rstest]
fn read_only_open_leaves_in_flight_installs_alone(area: Area) {
    let layout = ContentLayout::new(area.root.clone());
    install_active(&layout, "2026.06.1", 5);
    let staged = layout.staging_dir("pack-inflight");
    write_snapshot(&staged, "2026.07.0", 6);
    let renamed = layout.snapshot_dir(&snapshot_name(6, "2026.07.0"));
    write_snapshot(&renamed, "2026.07.0", 6);

    let store = ContentStore::open_read_only(area.root.clone()).expect("open read-only");
    assert_eq!(
        store.active_version().map(|version| version.sequence),
        Some(5)
    );
    assert!(staged.join(CONTENT_DB_FILE).exists());
    assert!(renamed.join(CONTENT_DB_FILE).exists());
}

#[rstest]
fn read_only_open_of_a_missing_area_creates_nothing(area: Area) {
    let store = ContentStore::open_read_only(area.root.clone()).expect("open read-only");
    assert!(store.current().is_none());
    assert!(!area.root.exists());
}
