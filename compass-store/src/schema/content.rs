use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::{SchemaError, run_migration_step};

/// Version of the content schema this build reads and writes.
pub const CONTENT_SCHEMA_VERSION: i64 = 2;

/// `content_meta` key holding the schema version.
pub const META_SCHEMA_VERSION: &str = "schema_version";
/// `content_meta` key holding the pack version string.
pub const META_VERSION: &str = "version";
/// `content_meta` key holding the pack sequence number.
pub const META_SEQUENCE: &str = "sequence";
/// `content_meta` key holding the pack publication time.
pub const META_PUBLISHED_AT: &str = "published_at";

/// Create the content tables, the full-text index and the metadata table.
///
/// Content databases are produced by the publishing pipeline and replaced
/// wholesale on activation; the application never migrates one in place.
/// An existing file recorded with another schema version is rejected.
///
/// # Errors
/// Returns [`SchemaError`] when a statement fails or the recorded version
/// differs from [`CONTENT_SCHEMA_VERSION`].
///
/// # Examples
/// ```
/// use compass_store::schema::{initialise_content_schema, read_meta, META_SCHEMA_VERSION};
/// use rusqlite::Connection;
///
/// let mut conn = Connection::open_in_memory().expect("open database");
/// initialise_content_schema(&mut conn).expect("create content schema");
/// let version = read_meta(&conn, META_SCHEMA_VERSION).expect("read meta");
/// assert_eq!(version.as_deref(), Some("2"));
/// ```
pub fn initialise_content_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin content schema transaction",
            source,
        })?;

    create_place_tables(&transaction)?;
    create_guide_tables(&transaction)?;
    create_bookkeeping_tables(&transaction)?;
    ensure_content_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit content schema transaction",
            source,
        })
}

fn create_place_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create places_base",
        "CREATE TABLE IF NOT EXISTS places_base (
            id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
            slug TEXT NOT NULL,
            category TEXT NOT NULL,
            lat REAL NOT NULL,
            lng REAL NOT NULL,
            neighborhood TEXT,
            price_range INTEGER CHECK (price_range BETWEEN 1 AND 4),
            rating REAL,
            images TEXT,
            opening_hours TEXT,
            contacts TEXT,
            featured INTEGER NOT NULL DEFAULT 0 CHECK (featured IN (0, 1)),
            status TEXT NOT NULL DEFAULT 'open',
            last_verified_at TEXT,
            accessibility_tags TEXT
        )",
    )?;
    run_migration_step(
        transaction,
        "create places_i18n",
        "CREATE TABLE IF NOT EXISTS places_i18n (
            place_id TEXT NOT NULL,
            locale TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            tips TEXT,
            search_keywords TEXT,
            PRIMARY KEY (place_id, locale)
        )",
    )?;
    run_migration_step(
        transaction,
        "index places_i18n by locale",
        "CREATE INDEX IF NOT EXISTS idx_places_i18n_locale ON places_i18n(locale, place_id)",
    )?;
    run_migration_step(
        transaction,
        "create places_fts",
        "CREATE VIRTUAL TABLE IF NOT EXISTS places_fts USING fts5(
            name, description, tips, search_keywords,
            locale UNINDEXED,
            content='places_i18n',
            content_rowid='rowid',
            tokenize='unicode61 remove_diacritics 2'
        )",
    )
}

fn create_guide_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create itineraries",
        "CREATE TABLE IF NOT EXISTS itineraries (
            id TEXT PRIMARY KEY,
            duration_type TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS itineraries_i18n (
            itinerary_id TEXT NOT NULL,
            locale TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            days TEXT NOT NULL,
            PRIMARY KEY (itinerary_id, locale)
        )",
    )?;
    run_migration_step(
        transaction,
        "create picks",
        "CREATE TABLE IF NOT EXISTS picks (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            place_id TEXT NOT NULL,
            images TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS picks_i18n (
            pick_id TEXT NOT NULL,
            locale TEXT NOT NULL,
            title TEXT NOT NULL,
            tagline TEXT NOT NULL,
            why_we_love_it TEXT NOT NULL,
            PRIMARY KEY (pick_id, locale)
        )",
    )?;
    run_migration_step(
        transaction,
        "create tips",
        "CREATE TABLE IF NOT EXISTS tips (
            id TEXT PRIMARY KEY,
            icon TEXT NOT NULL,
            last_reviewed_at TEXT NOT NULL,
            safety_level TEXT NOT NULL DEFAULT 'general',
            source_refs TEXT
        );
        CREATE TABLE IF NOT EXISTS tips_i18n (
            tip_id TEXT NOT NULL,
            locale TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            PRIMARY KEY (tip_id, locale)
        )",
    )?;
    run_migration_step(
        transaction,
        "create phrases",
        "CREATE TABLE IF NOT EXISTS phrases (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            english TEXT NOT NULL,
            darija TEXT NOT NULL,
            darija_latin TEXT NOT NULL,
            french TEXT NOT NULL,
            audio_path TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS phrases_i18n (
            phrase_id TEXT NOT NULL,
            locale TEXT NOT NULL,
            gloss TEXT NOT NULL,
            PRIMARY KEY (phrase_id, locale)
        )",
    )
}

fn create_bookkeeping_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create content_meta",
        "CREATE TABLE IF NOT EXISTS content_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID",
    )?;
    // Only delta packs populate this table.
    run_migration_step(
        transaction,
        "create pack_tombstones",
        "CREATE TABLE IF NOT EXISTS pack_tombstones (
            entity TEXT NOT NULL,
            id TEXT NOT NULL,
            PRIMARY KEY (entity, id)
        ) WITHOUT ROWID",
    )
}

fn ensure_content_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    let existing = read_meta(transaction, META_SCHEMA_VERSION).map_err(|source| {
        SchemaError::Migration {
            step: "read content schema version",
            source,
        }
    })?;
    match existing {
        Some(text) => {
            let found = text.parse::<i64>().unwrap_or(-1);
            if found != CONTENT_SCHEMA_VERSION {
                return Err(SchemaError::VersionMismatch {
                    database: "content",
                    expected: CONTENT_SCHEMA_VERSION,
                    found,
                });
            }
            Ok(())
        }
        None => write_meta(
            transaction,
            META_SCHEMA_VERSION,
            &CONTENT_SCHEMA_VERSION.to_string(),
        )
        .map_err(|source| SchemaError::Migration {
            step: "record content schema version",
            source,
        }),
    }
}

/// Read one `content_meta` value.
///
/// # Errors
/// Propagates `SQLite` failures.
pub fn read_meta(connection: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    connection
        .query_row(
            "SELECT value FROM content_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()
}

/// Insert or replace one `content_meta` value.
///
/// # Errors
/// Propagates `SQLite` failures.
pub fn write_meta(connection: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    connection
        .execute(
            "INSERT INTO content_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map(|_| ())
}

/// Rebuild `places_fts` from `places_i18n` and verify it.
///
/// Must run whenever the i18n rows change; a pack whose index disagrees with
/// its text would return stale search hits.
///
/// # Errors
/// Returns [`SchemaError::Migration`] when the rebuild fails and
/// [`SchemaError::SearchIndexCorrupt`] when the integrity check does.
pub fn rebuild_search_index(connection: &Connection) -> Result<(), SchemaError> {
    connection
        .execute("INSERT INTO places_fts(places_fts) VALUES ('rebuild')", [])
        .map_err(|source| SchemaError::Migration {
            step: "rebuild places_fts",
            source,
        })?;
    // rank = 1 also compares the index against the external content table.
    connection
        .execute(
            "INSERT INTO places_fts(places_fts, rank) VALUES ('integrity-check', 1)",
            [],
        )
        .map_err(|source| SchemaError::SearchIndexCorrupt { source })?;
    Ok(())
}
