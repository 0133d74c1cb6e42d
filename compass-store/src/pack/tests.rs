//! Tests for pack sealing and verification.

use camino::Utf8PathBuf;
use compass_core::test_support::{instant, place_base, place_text};
use compass_core::{AppVersion, ContentManifest, Locale, PlaceCategory};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

const SECRET: [u8; 32] = [7; 32];

struct SealedPack {
    _guard: TempDir,
    dir: Utf8PathBuf,
    manifest: ContentManifest,
    keys: KeyRing,
}

fn draft() -> PackDraft {
    PackDraft {
        version: "2026.06.1".to_owned(),
        sequence: 5,
        published_at: instant("2026-06-01T08:00:00Z").expect("instant"),
        min_app_version: AppVersion::new(1, 0, 0),
        delta_from: None,
    }
}

#[fixture]
fn sealed() -> SealedPack {
    let guard = tempfile::tempdir().expect("temp dir");
    let dir = Utf8PathBuf::from_path_buf(guard.path().join("pack")).expect("utf-8 path");
    let bundle = ContentBundle {
        places: vec![place_base("p1", PlaceCategory::Garden)],
        place_texts: vec![place_text("p1", Locale::En, "Secret Garden", "Restored riad garden")],
        ..ContentBundle::default()
    };
    write_content_database(&dir.join(compass_core::CONTENT_DB_FILE), &draft(), &bundle)
        .expect("write content db");
    compass_fs::write_file_atomically(&dir.join("map.pmtiles"), b"tiles").expect("extra file");
    let signer = PackSigner::from_bytes(&SECRET, 0);
    let manifest = seal_pack(&dir, &draft(), &signer).expect("seal pack");
    SealedPack {
        _guard: guard,
        dir,
        manifest,
        keys: KeyRing::new(vec![signer.verifying_key()]),
    }
}

#[rstest]
fn sealed_pack_verifies(sealed: SealedPack) {
    assert_eq!(sealed.manifest.pack_checksums.len(), 2);
    verify_pack(&sealed.manifest, &sealed.dir, &sealed.keys).expect("valid pack");
    let reloaded = PackSource::load("content-2026.06.1", sealed.dir.clone()).expect("load");
    assert_eq!(reloaded.manifest, sealed.manifest);
}

#[rstest]
fn tampered_file_fails_its_checksum(sealed: SealedPack) {
    compass_fs::write_file_atomically(&sealed.dir.join("map.pmtiles"), b"other tiles")
        .expect("tamper");
    let err = verify_pack(&sealed.manifest, &sealed.dir, &sealed.keys).expect_err("tampered");
    assert!(matches!(err, VerifyError::FileChecksum { ref file, .. } if file == "map.pmtiles"));
}

#[rstest]
fn edited_manifest_fails_the_signature(mut sealed: SealedPack) {
    sealed.manifest.sequence = 99;
    let err = verify_pack(&sealed.manifest, &sealed.dir, &sealed.keys).expect_err("forged");
    assert!(matches!(err, VerifyError::Signature(_)));
}

#[rstest]
fn checksum_must_cover_the_file_list(mut sealed: SealedPack) {
    sealed.manifest.checksum = "00".repeat(32);
    let err = verify_pack(&sealed.manifest, &sealed.dir, &sealed.keys).expect_err("bad checksum");
    assert!(matches!(err, VerifyError::ManifestChecksum { .. }));
}

#[rstest]
fn unknown_key_index_is_rejected(mut sealed: SealedPack) {
    sealed.manifest.signing_key_index = 3;
    let err = verify_pack(&sealed.manifest, &sealed.dir, &sealed.keys).expect_err("unknown key");
    assert!(matches!(err, VerifyError::UnknownSigningKey { index: 3 }));
}

#[rstest]
fn another_key_cannot_vouch_for_the_pack(sealed: SealedPack) {
    let stranger = PackSigner::from_bytes(&[9; 32], 0);
    let keys = KeyRing::new(vec![stranger.verifying_key()]);
    let err = verify_pack(&sealed.manifest, &sealed.dir, &keys).expect_err("wrong key");
    assert!(matches!(err, VerifyError::Signature(_)));
}

#[rstest]
fn pack_without_content_database_is_rejected(mut sealed: SealedPack) {
    sealed.manifest.pack_checksums.remove(compass_core::CONTENT_DB_FILE);
    let err = verify_pack(&sealed.manifest, &sealed.dir, &sealed.keys).expect_err("no db");
    assert!(matches!(err, VerifyError::MissingContentDb));
}

#[rstest]
fn path_like_file_names_are_rejected(mut sealed: SealedPack) {
    sealed
        .manifest
        .pack_checksums
        .insert("../escape".to_owned(), "00".repeat(32));
    let err = verify_pack(&sealed.manifest, &sealed.dir, &sealed.keys).expect_err("unsafe");
    assert!(matches!(err, VerifyError::UnsafeFileName { .. }));
}

#[rstest]
fn writing_over_an_existing_database_is_refused(sealed: SealedPack) {
    let err = write_content_database(
        &sealed.dir.join(compass_core::CONTENT_DB_FILE),
        &draft(),
        &ContentBundle::default(),
    )
    .expect_err("exists");
    assert!(matches!(err, PackWriteError::Exists { .. }));
}

#[rstest]
#[case("")]
#[case("# comment only\n\n")]
fn key_ring_skips_comments_and_blank_lines(#[case] text: &str) {
    assert!(KeyRing::from_hex_lines(text).expect("parse").is_empty());
}

#[rstest]
fn key_ring_reports_the_bad_line() {
    let err = KeyRing::from_hex_lines("# keys\nnot-hex\n").expect_err("malformed");
    assert!(matches!(err, KeyRingError::Encoding { line: 2 }));
}

#[rstest]
fn manifest_checksum_depends_on_every_entry() {
    let mut files = std::collections::BTreeMap::new();
    files.insert("content.db".to_owned(), "aa".to_owned());
    let one = manifest_checksum(&files);
    files.insert("map.pmtiles".to_owned(), "bb".to_owned());
    assert_ne!(one, manifest_checksum(&files));
    assert_eq!(one.len(), 64);
}
