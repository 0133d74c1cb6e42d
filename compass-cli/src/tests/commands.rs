//! End-to-end command tests: seal a pack, verify it, install it and read it
//! back from the data directory.

use super::helpers::{Publisher, published_at, write_utf8};
use super::*;
use crate::inspect::{PlaceConfig, SearchConfig, place_with, search_with, status_of};
use crate::pack::{
    InstallConfig, InstallReport, VerifyConfig, install_with, seal_with, verify_with,
};
use compass_core::{AppVersion, DownloadState, Locale, Place, SearchOptions};
use rstest::{fixture, rstest};

#[fixture]
fn publisher() -> Publisher {
    Publisher::new()
}

fn install(publisher: &Publisher, name: &str, sequence: u64) -> InstallReport {
    let sealed = publisher.seal_config(name, sequence);
    seal_with(&sealed, published_at()).expect("seal pack");
    install_with(&InstallConfig {
        pack_dir: sealed.pack_dir,
        data_dir: publisher.data_dir(),
        keys: publisher.keys(),
        app_version: AppVersion::new(1, 2, 0),
        pack_id: name.to_owned(),
    })
    .expect("install pack")
}

#[rstest]
fn sealed_packs_verify_against_the_trusted_keys(publisher: Publisher) {
    let config = publisher.seal_config("first", 1);
    let manifest = seal_with(&config, published_at()).expect("seal pack");
    assert_eq!(manifest.pack_checksums.len(), 1);

    let report = verify_with(&VerifyConfig {
        pack_dir: config.pack_dir,
        keys: publisher.keys(),
    })
    .expect("verify pack");
    let json = serde_json::to_value(&report).expect("serialise report");
    assert_eq!(json["version"], "2026.06.1");
    assert_eq!(json["sequence"], 1);
    assert_eq!(json["minAppVersion"], "1.0.0");
    assert_eq!(json["files"], 1);
}

#[rstest]
fn verification_fails_for_untrusted_keys(publisher: Publisher) {
    let config = publisher.seal_config("first", 1);
    seal_with(&config, published_at()).expect("seal pack");
    let other = publisher.root().join("other.keys");
    write_utf8(
        &other,
        hex::encode(
            compass_store::pack::PackSigner::from_bytes(&[3; 32], 0)
                .verifying_key()
                .as_bytes(),
        )
        .as_bytes(),
    );
    let err = verify_with(&VerifyConfig {
        pack_dir: config.pack_dir,
        keys: other,
    })
    .expect_err("wrong key");
    assert!(matches!(err, CliError::Verify(_)));
}

#[rstest]
fn malformed_secret_keys_are_reported(publisher: Publisher) {
    let config = publisher.seal_config("first", 1);
    write_utf8(&config.secret_key, b"not hex");
    let err = seal_with(&config, published_at()).expect_err("bad secret");
    assert!(matches!(err, CliError::SecretKey { .. }));
}

#[rstest]
fn installed_content_is_readable(publisher: Publisher) {
    let report = install(&publisher, "first", 1);
    let InstallReport::Activated { active } = report else {
        panic!("expected activation, found {report:?}");
    };
    assert_eq!(active.sequence, 1);

    let place = place_with(&PlaceConfig {
        place_id: "maison-de-la-photographie".to_owned(),
        data_dir: publisher.data_dir(),
        locale: Locale::Fr,
    })
    .expect("read place")
    .expect("place exists");
    assert_eq!(place.locale(), Locale::En);

    let hits = search_with(&SearchConfig {
        data_dir: publisher.data_dir(),
        options: SearchOptions::new("tajine", Locale::Fr),
    })
    .expect("search");
    assert_eq!(hits.iter().map(|p| p.id()).collect::<Vec<_>>(), ["le-jardin"]);

    let status = status_of(&publisher.data_dir()).expect("status");
    assert_eq!(status.active.map(|v| v.sequence), Some(1));
    let download = status.downloads.first().expect("one download");
    assert_eq!(download.pack_id, "first");
    assert_eq!(download.status, DownloadState::Ready);
}

#[rstest]
fn reinstalling_the_same_sequence_is_stale(publisher: Publisher) {
    install(&publisher, "first", 1);
    let report = install(&publisher, "again", 1);
    assert_eq!(report, InstallReport::Stale { offered: 1, active: 1 });

    let mut out = Vec::new();
    write_json(&mut out, &report).expect("write report");
    let json: serde_json::Value = serde_json::from_slice(&out).expect("json output");
    assert_eq!(json["outcome"], "stale");
}

#[rstest]
fn status_of_an_empty_data_directory(publisher: Publisher) {
    let status = status_of(&publisher.data_dir()).expect("status");
    assert!(status.active.is_none());
    assert!(status.downloads.is_empty());
}

fn run_command_line(args: &[&str]) -> Vec<u8> {
    let cli = Cli::try_parse_from(std::iter::once("compass").chain(args.iter().copied()))
        .expect("parse command line");
    let mut out = Vec::new();
    dispatch(cli.command, &mut out).expect("run command");
    out
}

#[rstest]
fn read_commands_leave_a_busy_data_directory_untouched(publisher: Publisher) {
    install(&publisher, "first", 1);
    let data_dir = publisher.data_dir();
    let in_flight = data_dir.join("content/staging/second");
    write_utf8(&in_flight.join("content.db"), b"partial download");

    let out = run_command_line(&[
        "place",
        "le-jardin",
        "--data-dir",
        data_dir.as_str(),
        "--locale",
        "fr",
    ]);
    let place: Place = serde_json::from_slice(&out).expect("place json");
    assert_eq!(place.id(), "le-jardin");
    assert_eq!(place.locale(), Locale::Fr);

    let out = run_command_line(&["status", "--data-dir", data_dir.as_str()]);
    let status: serde_json::Value = serde_json::from_slice(&out).expect("status json");
    assert_eq!(status["active"]["sequence"], 1);

    assert!(in_flight.join("content.db").exists());
}

#[rstest]
fn read_commands_do_not_create_a_user_database(publisher: Publisher) {
    let data_dir = publisher.data_dir();
    let out = run_command_line(&["status", "--data-dir", data_dir.as_str()]);
    let status: serde_json::Value = serde_json::from_slice(&out).expect("status json");
    assert!(status["active"].is_null());
    assert!(!data_dir.join(compass_store::USER_DB_FILE).exists());
}
