//! Tests for the user database.

use std::sync::Arc;

use compass_core::test_support::instant;
use compass_core::{
    ContentRef, ContentType, DownloadState, FixedClock, PackType, ReportType,
};
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn db() -> UserDatabase {
    let now = instant("2026-03-14T09:30:00Z").expect("fixture instant");
    UserDatabase::open_in_memory(Arc::new(FixedClock(now))).expect("open user database")
}

#[rstest]
fn favorites_are_idempotent_and_removable(db: UserDatabase) {
    let riad = ContentRef::place("riad-yasmine");
    db.add_favorite(&riad).expect("add favorite");
    db.add_favorite(&riad).expect("add favorite again");
    assert_eq!(db.favorites().expect("list").len(), 1);
    assert!(db.is_favorite(&riad).expect("check"));

    db.remove_favorite(&riad).expect("remove");
    db.remove_favorite(&riad).expect("remove absent");
    assert!(!db.is_favorite(&riad).expect("check"));
}

#[rstest]
fn toggling_twice_restores_the_original_state(db: UserDatabase) {
    let tour = ContentRef::new(ContentType::Itinerary, "two-days-medina");
    assert!(db.toggle_favorite(&tour).expect("toggle on"));
    assert!(!db.toggle_favorite(&tour).expect("toggle off"));
    assert!(db.favorites().expect("list").is_empty());
}

#[rstest]
fn favorites_list_newest_first(db: UserDatabase) {
    db.add_favorite(&ContentRef::place("a")).expect("add a");
    db.add_favorite(&ContentRef::new(ContentType::Pick, "b")).expect("add b");
    let ids: Vec<_> = db
        .favorites()
        .expect("list")
        .into_iter()
        .map(|fav| fav.content.content_id)
        .collect();
    assert_eq!(ids, ["b", "a"]);
}

#[rstest]
#[case(ContentType::Tip)]
#[case(ContentType::Phrase)]
fn tips_and_phrases_cannot_be_favourited(db: UserDatabase, #[case] kind: ContentType) {
    let err = db
        .add_favorite(&ContentRef::new(kind, "x"))
        .expect_err("not favoritable");
    assert!(matches!(err, UserDataError::NotFavoritable { content_type } if content_type == kind));
    assert!(db.favorites().expect("list").is_empty());
}

#[rstest]
fn notes_update_and_delete(db: UserDatabase) {
    let place = ContentRef::place("jardin-majorelle");
    let note = db.add_note(&place, Some("Go early")).expect("add note");
    assert_eq!(note.note_text.as_deref(), Some("Go early"));

    let updated = db
        .update_note(note.id, Some("Go at opening time"))
        .expect("update")
        .expect("note exists");
    assert_eq!(updated.note_text.as_deref(), Some("Go at opening time"));
    assert_eq!(db.notes_for(&place).expect("list").len(), 1);

    assert!(db.delete_note(note.id).expect("delete"));
    assert!(!db.delete_note(note.id).expect("delete again"));
    assert!(db.update_note(note.id, None).expect("update missing").is_none());
}

#[rstest]
fn checklist_appends_and_reorders(db: UserDatabase) {
    let first = db.add_checklist_item("Passport").expect("add");
    let second = db.add_checklist_item("Dirhams").expect("add");
    let third = db.add_checklist_item("Scarf").expect("add");
    assert_eq!((first.sort_order, second.sort_order, third.sort_order), (0, 1, 2));

    db.reorder_checklist(&[third.id, first.id, second.id])
        .expect("reorder");
    let titles: Vec<_> = db
        .checklist_items()
        .expect("list")
        .into_iter()
        .map(|item| item.title)
        .collect();
    assert_eq!(titles, ["Scarf", "Passport", "Dirhams"]);
}

#[rstest]
fn reorder_with_unknown_item_changes_nothing(db: UserDatabase) {
    let first = db.add_checklist_item("Passport").expect("add");
    let second = db.add_checklist_item("Dirhams").expect("add");

    let err = db
        .reorder_checklist(&[second.id, 999])
        .expect_err("unknown id");
    assert!(matches!(err, UserDataError::UnknownChecklistItem { id: 999 }));
    let ids: Vec<_> = db
        .checklist_items()
        .expect("list")
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, [first.id, second.id]);
}

#[rstest]
fn checklist_completion_and_deletion(db: UserDatabase) {
    let item = db.add_checklist_item("Sun cream").expect("add");
    assert!(db.set_checklist_completed(item.id, true).expect("complete"));
    assert!(db.checklist_items().expect("list").iter().all(|i| i.completed));
    assert!(db.delete_checklist_item(item.id).expect("delete"));
    assert!(!db.set_checklist_completed(item.id, false).expect("missing"));
}

#[rstest]
fn issue_reports_sync_once(db: UserDatabase) {
    let report = db
        .report_issue(
            &ContentRef::place("cafe-clock"),
            ReportType::Closed,
            Some("Shuttered since March"),
        )
        .expect("report");
    assert!(!report.synced);
    assert_eq!(db.unsynced_issue_reports().expect("list").len(), 1);

    assert_eq!(db.mark_issue_reports_synced(&[report.id]).expect("mark"), 1);
    assert_eq!(db.mark_issue_reports_synced(&[report.id]).expect("mark again"), 0);
    assert!(db.unsynced_issue_reports().expect("list").is_empty());
}

#[rstest]
fn download_state_keeps_counters_and_pins_ready_progress(db: UserDatabase) {
    let status = db
        .record_download_progress("content-2026.06", PackType::Content, 512, Some(2048))
        .expect("progress");
    assert_eq!(status.status, DownloadState::Downloading);
    assert_eq!(status.progress.to_bits(), 0.25_f64.to_bits());

    let ready = db
        .set_download_state("content-2026.06", PackType::Content, DownloadState::Ready, None)
        .expect("ready");
    assert_eq!(ready.downloaded_bytes, 512);
    assert_eq!(ready.size_bytes, Some(2048));
    assert_eq!(ready.progress.to_bits(), 1.0_f64.to_bits());

    let stored = db
        .download_status("content-2026.06")
        .expect("read")
        .expect("status recorded");
    assert_eq!(stored, ready);
}

#[rstest]
fn failed_downloads_carry_their_message(db: UserDatabase) {
    db.set_download_state(
        "map-marrakech",
        PackType::Map,
        DownloadState::Failed,
        Some("checksum mismatch"),
    )
    .expect("fail");
    let statuses = db.download_statuses().expect("list");
    assert_eq!(statuses.len(), 1);
    assert_eq!(
        statuses.first().and_then(|s| s.error_message.as_deref()),
        Some("checksum mismatch")
    );
}

#[rstest]
fn clear_all_empties_every_table(db: UserDatabase) {
    db.add_favorite(&ContentRef::place("a")).expect("favorite");
    db.add_checklist_item("Passport").expect("checklist");
    db.set_download_state("p", PackType::Routing, DownloadState::Pending, None)
        .expect("status");
    db.clear_all().expect("clear");
    assert!(db.favorites().expect("favorites").is_empty());
    assert!(db.checklist_items().expect("checklist").is_empty());
    assert!(db.download_statuses().expect("statuses").is_empty());
}

#[rstest]
fn reopening_a_file_keeps_records() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("nested/user.db"))
        .expect("utf-8 path");
    let clock = Arc::new(FixedClock(instant("2026-03-14T09:30:00Z").expect("instant")));
    {
        let db = UserDatabase::open(&path, clock.clone()).expect("open");
        db.add_favorite(&ContentRef::place("a")).expect("favorite");
    }
    let db = UserDatabase::open(&path, clock).expect("reopen");
    assert!(db.is_favorite(&ContentRef::place("a")).expect("check"));
}

#[rstest]
fn read_only_handles_see_saved_records_but_cannot_write() {
    let guard = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(guard.path().join("user.db")).expect("utf-8 path");
    let clock: Arc<dyn Clock> =
        Arc::new(FixedClock(instant("2026-03-14T09:30:00Z").expect("fixture instant")));
    let writer = UserDatabase::open(&path, Arc::clone(&clock)).expect("open user database");
    writer
        .add_favorite(&ContentRef::place("riad-yasmine"))
        .expect("add favorite");

    let reader = UserDatabase::open_read_only(&path, clock).expect("open read-only");
    assert!(
        reader
            .is_favorite(&ContentRef::place("riad-yasmine"))
            .expect("check")
    );
    assert!(reader.add_favorite(&ContentRef::place("le-jardin")).is_err());
}

#[rstest]
fn read_only_open_never_creates_the_file() {
    let guard = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(guard.path().join("user.db")).expect("utf-8 path");
    let clock: Arc<dyn Clock> =
        Arc::new(FixedClock(instant("2026-03-14T09:30:00Z").expect("fixture instant")));

    let err = UserDatabase::open_read_only(&path, clock).expect_err("missing database");
    assert!(matches!(err, UserDataError::Open { .. }));
    assert!(!path.exists());
}
