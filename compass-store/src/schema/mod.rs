//! Relational schemas for the content and user databases.
//!
//! Table and column names are a stable contract: external tools inspect these
//! files directly, so changes require a schema version bump.

mod content;
mod user;


use rusqlite::{Error as SqliteError, Transaction};
use thiserror::Error;

pub use content::{
    CONTENT_SCHEMA_VERSION, META_PUBLISHED_AT, META_SCHEMA_VERSION, META_SEQUENCE, META_VERSION,
    initialise_content_schema, read_meta, rebuild_search_index, write_meta,
};
pub use user::{USER_SCHEMA_VERSION, check_user_schema, initialise_user_schema};

/// Errors raised while creating or checking a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A pragma could not be applied.
    #[error("failed to set SQLite pragma '{pragma}'")]
    Pragma {
        /// Pragma name.
        pragma: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: SqliteError,
    },
    /// A DDL or bookkeeping statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Step description.
        step: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: SqliteError,
    },
    /// The database was created by a different schema version.
    #[error(
        "expected {database} schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Which database was checked.
        database: &'static str,
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the file.
        found: i64,
    },
    /// The full-text index failed its integrity check after a rebuild.
    #[error("full-text index failed its integrity check")]
    SearchIndexCorrupt {
        /// Underlying `SQLite` error.
        #[source]
        source: SqliteError,
    },
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute_batch(sql)
        .map_err(|source| SchemaError::Migration { step, source })
}
