//! Focused unit tests covering CLI configuration resolution.

use super::*;
use crate::inspect::{SearchArgs, SearchConfig};
use crate::pack::{InstallArgs, InstallConfig, SealArgs, SealConfig};
use camino::Utf8PathBuf;
use compass_core::{AppVersion, Locale, PlaceCategory};
use rstest::rstest;

fn seal_args() -> SealArgs {
    SealArgs {
        pack_dir: Some(Utf8PathBuf::from("packs/2026.06.1")),
        pack_version: Some("2026.06.1".to_owned()),
        sequence: Some(5),
        secret_key: Some(Utf8PathBuf::from("secret.key")),
        ..SealArgs::default()
    }
}

#[rstest]
fn seal_defaults_to_a_full_pack_signed_by_the_first_key() {
    let config = SealConfig::try_from(seal_args()).expect("config should build");
    assert_eq!(config.min_app_version, AppVersion::new(1, 0, 0));
    assert_eq!(config.key_index, 0);
    assert_eq!(config.delta_from, None);
    assert_eq!(config.bundle, None);
}

#[rstest]
fn seal_collects_delta_bases() {
    let args = SealArgs {
        delta_from: vec!["2026.05.1".to_owned(), "2026.05.2".to_owned()],
        min_app_version: Some("1.4.0".to_owned()),
        ..seal_args()
    };
    let config = SealConfig::try_from(args).expect("config should build");
    assert_eq!(
        config.delta_from.as_deref(),
        Some(["2026.05.1".to_owned(), "2026.05.2".to_owned()].as_slice())
    );
    assert_eq!(config.min_app_version, AppVersion::new(1, 4, 0));
}

#[rstest]
#[case::pack_dir(SealArgs { pack_dir: None, ..seal_args() }, ARG_PACK_DIR)]
#[case::version(SealArgs { pack_version: None, ..seal_args() }, ARG_PACK_VERSION)]
#[case::sequence(SealArgs { sequence: None, ..seal_args() }, ARG_SEQUENCE)]
#[case::secret(SealArgs { secret_key: None, ..seal_args() }, ARG_SECRET_KEY)]
fn seal_reports_missing_fields(#[case] args: SealArgs, #[case] expected: &'static str) {
    let err = SealConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument { command, field } => {
            assert_eq!(command, "seal");
            assert_eq!(field, expected);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn missing_argument_names_the_environment_variable() {
    let err = SealConfig::try_from(SealArgs {
        pack_version: None,
        ..seal_args()
    })
    .expect_err("missing version");
    assert_eq!(
        err.to_string(),
        "missing pack-version (set --pack-version or COMPASS_CMDS_SEAL_PACK_VERSION)"
    );
}

#[rstest]
fn install_rejects_malformed_app_versions() {
    let args = InstallArgs {
        pack_dir: Some(Utf8PathBuf::from("incoming/pack-7")),
        data_dir: Some(Utf8PathBuf::from("data")),
        keys: Some(Utf8PathBuf::from("trusted.keys")),
        app_version: Some("1.2".to_owned()),
        pack_id: None,
    };
    let err = InstallConfig::try_from(args).expect_err("malformed version");
    assert!(matches!(err, CliError::InvalidAppVersion(_)));
}

#[rstest]
fn install_names_the_pack_after_its_directory() {
    let args = InstallArgs {
        pack_dir: Some(Utf8PathBuf::from("incoming/pack-7")),
        data_dir: Some(Utf8PathBuf::from("data")),
        keys: Some(Utf8PathBuf::from("trusted.keys")),
        app_version: Some("1.2.0".to_owned()),
        pack_id: None,
    };
    let config = InstallConfig::try_from(args).expect("config should build");
    assert_eq!(config.pack_id, "pack-7");
    assert_eq!(config.app_version, AppVersion::new(1, 2, 0));
}

#[rstest]
fn search_applies_locale_category_and_limit() {
    let args = SearchArgs {
        query: Some("tagine".to_owned()),
        data_dir: Some(Utf8PathBuf::from("data")),
        locale: Some("ar".to_owned()),
        category: Some("restaurant".to_owned()),
        limit: Some(5),
    };
    let config = SearchConfig::try_from(args).expect("config should build");
    assert_eq!(config.options.locale, Locale::Ar);
    assert_eq!(config.options.filters.category, Some(PlaceCategory::Restaurant));
    assert_eq!(config.options.limit, Some(5));
}

#[rstest]
#[case::locale(Some("pt"), None)]
#[case::category(None, Some("nightclub"))]
fn search_rejects_unknown_values(#[case] locale: Option<&str>, #[case] category: Option<&str>) {
    let args = SearchArgs {
        query: Some("tagine".to_owned()),
        data_dir: Some(Utf8PathBuf::from("data")),
        locale: locale.map(str::to_owned),
        category: category.map(str::to_owned),
        limit: None,
    };
    let err = SearchConfig::try_from(args).expect_err("unknown value");
    assert!(matches!(err, CliError::InvalidValue(_)));
}

#[rstest]
fn json_output_ends_with_a_newline() {
    let mut out = Vec::new();
    write_json(&mut out, &["riad"]).expect("write");
    assert_eq!(String::from_utf8(out).expect("utf-8"), "[\n  \"riad\"\n]\n");
}
