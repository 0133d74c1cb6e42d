//! Command-line tooling for Marrakech Compass content packs.
//!
//! Publishers build, seal and verify packs; operators install them into a
//! data directory and inspect what the app would read from it. Every command
//! writes JSON to stdout and logs progress through `log`.
#![forbid(unsafe_code)]

mod error;
mod inspect;
mod pack;

use std::io::Write;

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use compass_store::pack::KeyRing;
use serde::Serialize;

pub use error::CliError;

use crate::inspect::{PlaceArgs, SearchArgs, StatusArgs};
use crate::pack::{InstallArgs, SealArgs, VerifyArgs};

const ARG_BUNDLE: &str = "bundle";
const ARG_DATA_DIR: &str = "data-dir";
const ARG_DELTA_FROM: &str = "delta-from";
const ARG_KEYS: &str = "keys";
const ARG_KEY_INDEX: &str = "key-index";
const ARG_LIMIT: &str = "limit";
const ARG_LOCALE: &str = "locale";
const ARG_APP_VERSION: &str = "app-version";
const ARG_MIN_APP_VERSION: &str = "min-app-version";
const ARG_PACK_DIR: &str = "pack-dir";
const ARG_PACK_ID: &str = "pack-id";
const ARG_PACK_VERSION: &str = "pack-version";
const ARG_PLACE_ID: &str = "place-id";
const ARG_QUERY: &str = "query";
const ARG_SECRET_KEY: &str = "secret-key";
const ARG_SEQUENCE: &str = "sequence";
const ARG_CATEGORY: &str = "category";

/// Run the Compass CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid or the command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &mut stdout)
}

fn dispatch(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Seal(args) => pack::run_seal(args, writer),
        Command::Verify(args) => pack::run_verify(args, writer),
        Command::Install(args) => pack::run_install(args, writer),
        Command::Place(args) => inspect::run_place(args, writer),
        Command::Search(args) => inspect::run_search(args, writer),
        Command::Status(args) => inspect::run_status(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "compass",
    about = "Build, verify and install Marrakech Compass content packs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a content database if asked, then checksum and sign a pack.
    Seal(SealArgs),
    /// Check a pack's checksums and signature.
    Verify(VerifyArgs),
    /// Install a pack into a data directory.
    Install(InstallArgs),
    /// Print one place, resolved through the locale fallback chain.
    Place(PlaceArgs),
    /// Full-text search over places.
    Search(SearchArgs),
    /// Print the active content version and download states.
    Status(StatusArgs),
}

/// Unwrap a merged option or report which flag and variable supply it.
fn require<T>(value: Option<T>, command: &'static str, field: &'static str) -> Result<T, CliError> {
    value.ok_or(CliError::MissingArgument { command, field })
}

fn read_text(path: &Utf8Path, what: &'static str) -> Result<String, CliError> {
    let read_error = |source| CliError::ReadFile {
        what,
        path: path.to_owned(),
        source,
    };
    compass_fs::read_optional_string(path)
        .map_err(read_error)?
        .ok_or_else(|| read_error(std::io::ErrorKind::NotFound.into()))
}

/// Load trusted verifying keys, one hex key per line.
fn load_keys(path: &Utf8Path) -> Result<KeyRing, CliError> {
    Ok(KeyRing::from_hex_lines(&read_text(path, "trusted keys")?)?)
}

fn write_json<T: Serialize + ?Sized>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .map_err(CliError::WriteOutput)
}

#[cfg(test)]
mod tests;
