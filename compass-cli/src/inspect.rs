//! Read-only commands that show what the app would read from a data
//! directory.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use compass_core::{
    Clock, ContentVersion, DEFAULT_LOCALE, DownloadStatus, Locale, Place, PlaceCategory,
    PlaceFilters, Repository, SearchOptions, SystemClock,
};
use compass_store::{
    CONTENT_DIR, ContentStore, DataLayerError, SqliteRepository, USER_DB_FILE, UserDatabase,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CATEGORY, ARG_DATA_DIR, ARG_LIMIT, ARG_LOCALE, ARG_PLACE_ID, ARG_QUERY, CliError, require,
    write_json,
};

const PLACE: &str = "place";
const SEARCH: &str = "search";
const STATUS: &str = "status";

/// Open the stores under `data_dir` for reading.
///
/// Nothing under `data_dir` is created, cleaned up or written, so the app or
/// an install may be using it at the same time. A data directory without a
/// user database reads as one with no user records.
pub(crate) fn open_repository(data_dir: &Utf8Path) -> Result<SqliteRepository, CliError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let content =
        ContentStore::open_read_only(data_dir.join(CONTENT_DIR)).map_err(DataLayerError::from)?;
    let user_db = data_dir.join(USER_DB_FILE);
    let existing = compass_fs::is_file(&user_db).map_err(|source| CliError::ReadFile {
        what: "user database",
        path: user_db.clone(),
        source,
    })?;
    let user = if existing {
        UserDatabase::open_read_only(&user_db, Arc::clone(&clock))
    } else {
        UserDatabase::open_in_memory(Arc::clone(&clock))
    }
    .map_err(DataLayerError::from)?;
    Ok(SqliteRepository::new(
        Arc::new(content),
        Arc::new(user),
        clock,
    ))
}

fn parse_locale(code: Option<&str>) -> Result<Locale, CliError> {
    code.map_or(Ok(DEFAULT_LOCALE), |code| Ok(Locale::parse(code)?))
}

/// CLI arguments for the `place` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Print one place, resolved through the locale fallback chain")]
#[ortho_config(prefix = "COMPASS")]
pub(crate) struct PlaceArgs {
    /// Place id.
    #[arg(value_name = "id")]
    #[serde(default)]
    pub(crate) place_id: Option<String>,
    /// Data directory holding `content/` and `user.db`.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Requested locale; defaults to English.
    #[arg(long = ARG_LOCALE, value_name = "code")]
    #[serde(default)]
    pub(crate) locale: Option<String>,
}

/// Resolved `place` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlaceConfig {
    pub(crate) place_id: String,
    pub(crate) data_dir: Utf8PathBuf,
    pub(crate) locale: Locale,
}

impl TryFrom<PlaceArgs> for PlaceConfig {
    type Error = CliError;

    fn try_from(args: PlaceArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            place_id: require(args.place_id, PLACE, ARG_PLACE_ID)?,
            data_dir: require(args.data_dir, PLACE, ARG_DATA_DIR)?,
            locale: parse_locale(args.locale.as_deref())?,
        })
    }
}

pub(crate) fn run_place(args: PlaceArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let place = place_with(&PlaceConfig::try_from(merged)?)?;
    write_json(writer, &place)
}

pub(crate) fn place_with(config: &PlaceConfig) -> Result<Option<Place>, CliError> {
    let repo = open_repository(&config.data_dir)?;
    Ok(repo.place(&config.place_id, config.locale)?)
}

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Search place names, descriptions, tips and keywords. Only \
                 the first locale in the fallback chain that has any text is \
                 searched; hits are ranked by relevance.",
    about = "Full-text search over places"
)]
#[ortho_config(prefix = "COMPASS")]
pub(crate) struct SearchArgs {
    /// Free-text query.
    #[arg(value_name = "text")]
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// Data directory holding `content/` and `user.db`.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Requested locale; defaults to English.
    #[arg(long = ARG_LOCALE, value_name = "code")]
    #[serde(default)]
    pub(crate) locale: Option<String>,
    /// Restrict hits to one category.
    #[arg(long = ARG_CATEGORY, value_name = "category")]
    #[serde(default)]
    pub(crate) category: Option<String>,
    /// Maximum number of hits.
    #[arg(long = ARG_LIMIT, value_name = "n")]
    #[serde(default)]
    pub(crate) limit: Option<u32>,
}

/// Resolved `search` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchConfig {
    pub(crate) data_dir: Utf8PathBuf,
    pub(crate) options: SearchOptions,
}

impl TryFrom<SearchArgs> for SearchConfig {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let query = require(args.query, SEARCH, ARG_QUERY)?;
        let mut options = SearchOptions::new(query, parse_locale(args.locale.as_deref())?);
        if let Some(category) = args.category.as_deref() {
            options = options
                .with_filters(PlaceFilters::default().with_category(category.parse::<PlaceCategory>()?));
        }
        if let Some(limit) = args.limit {
            options = options.with_limit(limit);
        }
        Ok(Self {
            data_dir: require(args.data_dir, SEARCH, ARG_DATA_DIR)?,
            options,
        })
    }
}

pub(crate) fn run_search(args: SearchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let hits = search_with(&SearchConfig::try_from(merged)?)?;
    write_json(writer, &hits)
}

pub(crate) fn search_with(config: &SearchConfig) -> Result<Vec<Place>, CliError> {
    Ok(open_repository(&config.data_dir)?.search_places(&config.options)?)
}

/// CLI arguments for the `status` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Print the active content version and download states")]
#[ortho_config(prefix = "COMPASS")]
pub(crate) struct StatusArgs {
    /// Data directory holding `content/` and `user.db`.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
}

/// What `status` prints.
#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    pub(crate) active: Option<ContentVersion>,
    pub(crate) downloads: Vec<DownloadStatus>,
}

pub(crate) fn run_status(args: StatusArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let data_dir = require(merged.data_dir, STATUS, ARG_DATA_DIR)?;
    write_json(writer, &status_of(&data_dir)?)
}

pub(crate) fn status_of(data_dir: &Utf8Path) -> Result<StatusReport, CliError> {
    let repo = open_repository(data_dir)?;
    Ok(StatusReport {
        active: repo.active_content_version()?,
        downloads: repo.user_data().download_statuses()?,
    })
}
