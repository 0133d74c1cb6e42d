//! Error types emitted by the Compass CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use compass_core::{AppVersionError, UnknownVariant};
use compass_store::pack::{KeyRingError, PackWriteError, VerifyError};
use compass_store::{DataLayerError, RepositoryError, SwapError, UserDataError};
use thiserror::Error;

/// Errors emitted by the Compass CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {})", env_var(.command, .field))]
    MissingArgument {
        /// Subcommand being configured.
        command: &'static str,
        /// Missing option.
        field: &'static str,
    },
    /// A locale or category option names an unknown value.
    #[error("invalid option value: {0}")]
    InvalidValue(#[from] UnknownVariant),
    /// A version option is not `major.minor.patch`.
    #[error(transparent)]
    InvalidAppVersion(#[from] AppVersionError),
    /// An input file could not be read.
    #[error("failed to read {what} at {path:?}: {source}")]
    ReadFile {
        /// Which input was being read.
        what: &'static str,
        /// File path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The trusted key file is malformed.
    #[error("failed to load signing keys: {0}")]
    Keys(#[from] KeyRingError),
    /// The secret key file does not hold 32 hex-encoded bytes.
    #[error("secret key at {path:?} must hold 64 hex digits")]
    SecretKey {
        /// Key file path.
        path: Utf8PathBuf,
    },
    /// The pack failed checksum or signature verification.
    #[error(transparent)]
    Verify(#[from] VerifyError),
    /// Writing or sealing a pack failed.
    #[error(transparent)]
    Seal(#[from] PackWriteError),
    /// Installing a pack failed.
    #[error(transparent)]
    Swap(#[from] SwapError),
    /// The data directory could not be opened.
    #[error(transparent)]
    OpenData(#[from] DataLayerError),
    /// A content read failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// A user database read failed.
    #[error(transparent)]
    UserData(#[from] UserDataError),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

/// Environment variable that supplies `field` for `command`.
pub(crate) fn env_var(command: &str, field: &str) -> String {
    format!(
        "COMPASS_CMDS_{}_{}",
        command.to_ascii_uppercase(),
        field.to_ascii_uppercase().replace('-', "_")
    )
}
