use rusqlite::{Connection, OptionalExtension, Transaction};

use super::{SchemaError, run_migration_step};

/// Version of the user schema this build reads and writes.
pub const USER_SCHEMA_VERSION: i64 = 1;

/// Create the user tables and apply the connection pragmas.
///
/// The user database is opened once per process and written by a single
/// writer, so WAL journaling with `synchronous = NORMAL` keeps favourite
/// toggles fast without risking committed rows.
///
/// # Errors
/// Returns [`SchemaError`] when a pragma or statement fails, or when the
/// file was created by another schema version.
pub fn initialise_user_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    apply_pragmas(connection)?;

    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin user schema transaction",
            source,
        })?;

    create_user_tables(&transaction)?;
    ensure_user_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit user schema transaction",
            source,
        })
}

/// Check that an existing user database uses this build's schema, without
/// writing to it.
///
/// # Errors
/// Returns [`SchemaError::VersionMismatch`] for another version, or
/// [`SchemaError::Migration`] when the version table cannot be read.
pub fn check_user_schema(connection: &Connection) -> Result<(), SchemaError> {
    let found: i64 = connection
        .query_row("SELECT version FROM user_schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .map_err(|source| SchemaError::Migration {
            step: "read user schema version",
            source,
        })?;
    if found == USER_SCHEMA_VERSION {
        Ok(())
    } else {
        Err(SchemaError::VersionMismatch {
            database: "user",
            expected: USER_SCHEMA_VERSION,
            found,
        })
    }
}

fn apply_pragmas(connection: &Connection) -> Result<(), SchemaError> {
    // `journal_mode` returns a row, so `pragma_update` cannot be used for it.
    connection
        .query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .map_err(|source| SchemaError::Pragma {
            pragma: "journal_mode",
            source,
        })?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .map_err(|source| SchemaError::Pragma {
            pragma: "synchronous",
            source,
        })?;
    connection
        .pragma_update(None, "foreign_keys", true)
        .map_err(|source| SchemaError::Pragma {
            pragma: "foreign_keys",
            source,
        })
}

fn create_user_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create favorites",
        "CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL,
            content_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(content_type, content_id)
        )",
    )?;
    run_migration_step(
        transaction,
        "create notes",
        "CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL,
            content_id TEXT NOT NULL,
            note_text TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notes_content ON notes(content_type, content_id)",
    )?;
    run_migration_step(
        transaction,
        "create checklist_items",
        "CREATE TABLE IF NOT EXISTS checklist_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            completed INTEGER DEFAULT 0,
            sort_order INTEGER,
            created_at TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "create issue_reports",
        "CREATE TABLE IF NOT EXISTS issue_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL,
            content_id TEXT NOT NULL,
            report_type TEXT NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL,
            synced INTEGER DEFAULT 0
        )",
    )?;
    run_migration_step(
        transaction,
        "create download_status",
        "CREATE TABLE IF NOT EXISTS download_status (
            pack_id TEXT PRIMARY KEY,
            pack_type TEXT NOT NULL,
            status TEXT NOT NULL,
            progress REAL DEFAULT 0,
            size_bytes INTEGER,
            downloaded_bytes INTEGER DEFAULT 0,
            error_message TEXT,
            updated_at TEXT NOT NULL
        )",
    )
}

fn ensure_user_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create user_schema_version",
        "CREATE TABLE IF NOT EXISTS user_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing: Option<i64> = transaction
        .query_row("SELECT version FROM user_schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read user schema version",
            source,
        })?;

    match existing {
        Some(version) if version == USER_SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            database: "user",
            expected: USER_SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO user_schema_version (version) VALUES (?1)",
                [USER_SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record user schema version",
                source,
            }),
    }
}
