//! Pack publishing and installation commands.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use clap::Parser;
use compass_core::{AppVersion, CONTENT_DB_FILE, ContentManifest, ContentVersion};
use compass_store::pack::{
    ContentBundle, PackDraft, PackSigner, seal_pack, verify_pack, write_content_database,
};
use compass_store::{DataLayer, InstallOutcome, PackSource, StoreConfig};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    ARG_APP_VERSION, ARG_BUNDLE, ARG_DATA_DIR, ARG_DELTA_FROM, ARG_KEY_INDEX, ARG_KEYS,
    ARG_MIN_APP_VERSION, ARG_PACK_DIR, ARG_PACK_ID, ARG_PACK_VERSION, ARG_SECRET_KEY,
    ARG_SEQUENCE, CliError, load_keys, read_text, require, write_json,
};

const SEAL: &str = "seal";
const VERIFY: &str = "verify";
const INSTALL: &str = "install";

/// Oldest app a pack supports when the publisher does not say.
const DEFAULT_MIN_APP_VERSION: AppVersion = AppVersion::new(1, 0, 0);

/// CLI arguments for the `seal` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Seal a pack directory: optionally write content.db from a \
                 JSON content bundle, then checksum every file and sign the \
                 manifest. The signed manifest is printed.",
    about = "Checksum and sign a content pack"
)]
#[ortho_config(prefix = "COMPASS")]
pub(crate) struct SealArgs {
    /// Directory holding the pack files.
    #[arg(value_name = "dir")]
    #[serde(default)]
    pub(crate) pack_dir: Option<Utf8PathBuf>,
    /// JSON content bundle to write as the pack's content database.
    #[arg(long = ARG_BUNDLE, value_name = "path")]
    #[serde(default)]
    pub(crate) bundle: Option<Utf8PathBuf>,
    /// Pack version string, e.g. `2026.06.1`.
    #[arg(long = ARG_PACK_VERSION, value_name = "version")]
    #[serde(default)]
    pub(crate) pack_version: Option<String>,
    /// Monotonic release counter.
    #[arg(long = ARG_SEQUENCE, value_name = "n")]
    #[serde(default)]
    pub(crate) sequence: Option<u64>,
    /// Oldest app version able to read the pack.
    #[arg(long = ARG_MIN_APP_VERSION, value_name = "version")]
    #[serde(default)]
    pub(crate) min_app_version: Option<String>,
    /// Versions this delta pack applies to; omit for a full pack.
    #[arg(long = ARG_DELTA_FROM, value_name = "version")]
    #[serde(default)]
    pub(crate) delta_from: Vec<String>,
    /// File holding the hex-encoded 32-byte signing secret.
    #[arg(long = ARG_SECRET_KEY, value_name = "path")]
    #[serde(default)]
    pub(crate) secret_key: Option<Utf8PathBuf>,
    /// Position of the signing key in the app's key ring.
    #[arg(long = ARG_KEY_INDEX, value_name = "n")]
    #[serde(default)]
    pub(crate) key_index: Option<u32>,
}

impl SealArgs {
    fn into_config(self) -> Result<SealConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SealConfig::try_from(merged)
    }
}

/// Resolved `seal` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SealConfig {
    pub(crate) pack_dir: Utf8PathBuf,
    pub(crate) bundle: Option<Utf8PathBuf>,
    pub(crate) version: String,
    pub(crate) sequence: u64,
    pub(crate) min_app_version: AppVersion,
    pub(crate) delta_from: Option<Vec<String>>,
    pub(crate) secret_key: Utf8PathBuf,
    pub(crate) key_index: u32,
}

impl SealConfig {
    pub(crate) fn draft(&self, published_at: DateTime<Utc>) -> PackDraft {
        PackDraft {
            version: self.version.clone(),
            sequence: self.sequence,
            published_at,
            min_app_version: self.min_app_version,
            delta_from: self.delta_from.clone(),
        }
    }
}

impl TryFrom<SealArgs> for SealConfig {
    type Error = CliError;

    fn try_from(args: SealArgs) -> Result<Self, Self::Error> {
        let min_app_version = args
            .min_app_version
            .as_deref()
            .map(str::parse::<AppVersion>)
            .transpose()?
            .unwrap_or(DEFAULT_MIN_APP_VERSION);
        Ok(Self {
            pack_dir: require(args.pack_dir, SEAL, ARG_PACK_DIR)?,
            bundle: args.bundle,
            version: require(args.pack_version, SEAL, ARG_PACK_VERSION)?,
            sequence: require(args.sequence, SEAL, ARG_SEQUENCE)?,
            min_app_version,
            delta_from: (!args.delta_from.is_empty()).then_some(args.delta_from),
            secret_key: require(args.secret_key, SEAL, ARG_SECRET_KEY)?,
            key_index: args.key_index.unwrap_or_default(),
        })
    }
}

pub(crate) fn run_seal(args: SealArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let manifest = seal_with(&config, Utc::now())?;
    write_json(writer, &manifest)
}

/// Build (when a bundle is given) and sign the pack described by `config`.
pub(crate) fn seal_with(
    config: &SealConfig,
    published_at: DateTime<Utc>,
) -> Result<ContentManifest, CliError> {
    let signer = load_signer(&config.secret_key, config.key_index)?;
    let draft = config.draft(published_at);
    if let Some(bundle_path) = &config.bundle {
        let bundle: ContentBundle = serde_json::from_str(&read_text(bundle_path, "content bundle")?)
            .map_err(|source| CliError::ReadFile {
                what: "content bundle",
                path: bundle_path.clone(),
                source: source.into(),
            })?;
        write_content_database(&config.pack_dir.join(CONTENT_DB_FILE), &draft, &bundle)?;
        info!(
            "wrote {} places to {}",
            bundle.places.len(),
            config.pack_dir.join(CONTENT_DB_FILE)
        );
    }
    let manifest = seal_pack(&config.pack_dir, &draft, &signer)?;
    info!(
        "sealed pack {} (sequence {}) with {} files",
        manifest.version,
        manifest.sequence,
        manifest.pack_checksums.len()
    );
    Ok(manifest)
}

fn load_signer(path: &Utf8Path, index: u32) -> Result<PackSigner, CliError> {
    let text = read_text(path, "secret key")?;
    let mut secret = [0_u8; 32];
    hex::decode_to_slice(text.trim(), &mut secret).map_err(|_| CliError::SecretKey {
        path: path.to_owned(),
    })?;
    Ok(PackSigner::from_bytes(&secret, index))
}

/// CLI arguments for the `verify` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Check a pack's checksums and signature")]
#[ortho_config(prefix = "COMPASS")]
pub(crate) struct VerifyArgs {
    /// Directory holding the pack files.
    #[arg(value_name = "dir")]
    #[serde(default)]
    pub(crate) pack_dir: Option<Utf8PathBuf>,
    /// File of trusted public keys, one hex key per line.
    #[arg(long = ARG_KEYS, value_name = "path")]
    #[serde(default)]
    pub(crate) keys: Option<Utf8PathBuf>,
}

/// Resolved `verify` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VerifyConfig {
    pub(crate) pack_dir: Utf8PathBuf,
    pub(crate) keys: Utf8PathBuf,
}

impl TryFrom<VerifyArgs> for VerifyConfig {
    type Error = CliError;

    fn try_from(args: VerifyArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            pack_dir: require(args.pack_dir, VERIFY, ARG_PACK_DIR)?,
            keys: require(args.keys, VERIFY, ARG_KEYS)?,
        })
    }
}

/// Summary printed for a pack that verified.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyReport {
    version: String,
    sequence: u64,
    min_app_version: AppVersion,
    delta_from: Option<Vec<String>>,
    files: usize,
}

pub(crate) fn run_verify(args: VerifyArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let report = verify_with(&VerifyConfig::try_from(merged)?)?;
    write_json(writer, &report)
}

pub(crate) fn verify_with(config: &VerifyConfig) -> Result<VerifyReport, CliError> {
    let keys = load_keys(&config.keys)?;
    let source = PackSource::load(pack_id_for(&config.pack_dir), config.pack_dir.clone())?;
    let manifest = source.manifest;
    verify_pack(&manifest, &config.pack_dir, &keys)?;
    info!("pack {} (sequence {}) verified", manifest.version, manifest.sequence);
    Ok(VerifyReport {
        files: manifest.pack_checksums.len(),
        version: manifest.version,
        sequence: manifest.sequence,
        min_app_version: manifest.min_app_version,
        delta_from: manifest.delta_from,
    })
}

/// CLI arguments for the `install` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Verify a pack and make it the active content of a data \
                 directory. Stale packs are ignored and packs for a newer app \
                 are parked in quarantine; both leave the active content as \
                 it was.",
    about = "Install a pack into a data directory"
)]
#[ortho_config(prefix = "COMPASS")]
pub(crate) struct InstallArgs {
    /// Directory holding the pack files.
    #[arg(value_name = "dir")]
    #[serde(default)]
    pub(crate) pack_dir: Option<Utf8PathBuf>,
    /// Data directory holding `content/` and `user.db`.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// File of trusted public keys, one hex key per line.
    #[arg(long = ARG_KEYS, value_name = "path")]
    #[serde(default)]
    pub(crate) keys: Option<Utf8PathBuf>,
    /// Version of the app the data directory belongs to.
    #[arg(long = ARG_APP_VERSION, value_name = "version")]
    #[serde(default)]
    pub(crate) app_version: Option<String>,
    /// Download id recorded for the pack; defaults to the directory name.
    #[arg(long = ARG_PACK_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) pack_id: Option<String>,
}

/// Resolved `install` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstallConfig {
    pub(crate) pack_dir: Utf8PathBuf,
    pub(crate) data_dir: Utf8PathBuf,
    pub(crate) keys: Utf8PathBuf,
    pub(crate) app_version: AppVersion,
    pub(crate) pack_id: String,
}

impl TryFrom<InstallArgs> for InstallConfig {
    type Error = CliError;

    fn try_from(args: InstallArgs) -> Result<Self, Self::Error> {
        let pack_dir = require(args.pack_dir, INSTALL, ARG_PACK_DIR)?;
        let app_version = require(args.app_version, INSTALL, ARG_APP_VERSION)?.parse::<AppVersion>()?;
        let pack_id = args.pack_id.unwrap_or_else(|| pack_id_for(&pack_dir));
        Ok(Self {
            data_dir: require(args.data_dir, INSTALL, ARG_DATA_DIR)?,
            keys: require(args.keys, INSTALL, ARG_KEYS)?,
            pack_dir,
            app_version,
            pack_id,
        })
    }
}

/// What an install did, as printed.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub(crate) enum InstallReport {
    Activated {
        active: ContentVersion,
    },
    Stale {
        offered: u64,
        active: u64,
    },
    Incompatible {
        required: AppVersion,
        running: AppVersion,
    },
    Cancelled,
}

impl From<InstallOutcome> for InstallReport {
    fn from(outcome: InstallOutcome) -> Self {
        match outcome {
            InstallOutcome::Activated(active) => Self::Activated { active },
            InstallOutcome::Stale { offered, active } => Self::Stale { offered, active },
            InstallOutcome::Incompatible { required, running } => {
                Self::Incompatible { required, running }
            }
            InstallOutcome::Cancelled => Self::Cancelled,
        }
    }
}

pub(crate) fn run_install(args: InstallArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let report = install_with(&InstallConfig::try_from(merged)?)?;
    write_json(writer, &report)
}

pub(crate) fn install_with(config: &InstallConfig) -> Result<InstallReport, CliError> {
    let layer = DataLayer::init(StoreConfig {
        data_dir: config.data_dir.clone(),
        app_version: config.app_version,
        keys: load_keys(&config.keys)?,
    })?;
    let source = PackSource::load(config.pack_id.clone(), config.pack_dir.clone())?;
    let outcome = layer
        .swap_manager()
        .install(&source, &CancellationToken::new())?;
    Ok(outcome.into())
}

fn pack_id_for(dir: &Utf8Path) -> String {
    dir.file_name().unwrap_or("pack").to_owned()
}
