//! The traveller's own records: favourites, notes, checklist, issue reports
//! and download progress.
//!
//! The user database has a single writer (the app), so one mutex-guarded
//! connection serialises every mutation. Each mutation is one statement or
//! one transaction; a failure never leaves a partial row behind.

mod checklist;
mod downloads;
mod favorites;
mod notes;
mod reports;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::{Clock, ContentType};
use rusqlite::{Connection, OpenFlags, Transaction};
use thiserror::Error;

use crate::schema::{SchemaError, check_user_schema, initialise_user_schema};

/// Errors raised by user database operations.
#[derive(Debug, Error)]
pub enum UserDataError {
    /// The database file could not be opened.
    #[error("failed to open user database at {path}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// The directory for the database file could not be created.
    #[error("failed to create the directory for {path}")]
    CreateDir {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The database could not be created or has another schema version.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A statement failed.
    #[error("user database operation '{operation}' failed")]
    Query {
        /// What was being attempted.
        operation: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// Only places, itineraries and picks can be favourited.
    #[error("{content_type} content cannot be saved as a favorite")]
    NotFavoritable {
        /// Rejected content kind.
        content_type: ContentType,
    },
    /// A checklist reorder named an item that does not exist.
    #[error("checklist item {id} does not exist")]
    UnknownChecklistItem {
        /// Missing item id.
        id: i64,
    },
}

/// Connection to the user database.
pub struct UserDatabase {
    connection: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for UserDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDatabase").finish_non_exhaustive()
    }
}

impl UserDatabase {
    /// Open or create the user database at `path`.
    ///
    /// # Errors
    /// Returns [`UserDataError`] when the file cannot be opened or its schema
    /// cannot be created.
    pub fn open(path: &Utf8Path, clock: Arc<dyn Clock>) -> Result<Self, UserDataError> {
        compass_fs::ensure_parent_dir(path).map_err(|source| UserDataError::CreateDir {
            path: path.to_owned(),
            source,
        })?;
        let connection = Connection::open(path).map_err(|source| UserDataError::Open {
            path: path.to_owned(),
            source,
        })?;
        Self::from_connection(connection, clock)
    }

    /// Open an existing user database at `path` for reading only.
    ///
    /// The schema is checked but never created or migrated, and every
    /// mutation on the returned handle fails.
    ///
    /// # Errors
    /// Returns [`UserDataError`] when the file does not exist, cannot be
    /// opened, or was written by another schema version.
    pub fn open_read_only(path: &Utf8Path, clock: Arc<dyn Clock>) -> Result<Self, UserDataError> {
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| UserDataError::Open {
            path: path.to_owned(),
            source,
        })?;
        check_user_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            clock,
        })
    }

    /// A throwaway database for tests and previews.
    ///
    /// # Errors
    /// Returns [`UserDataError`] when the schema cannot be created.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self, UserDataError> {
        let connection = Connection::open_in_memory().map_err(|source| UserDataError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(connection, clock)
    }

    fn from_connection(
        mut connection: Connection,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, UserDataError> {
        initialise_user_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            clock,
        })
    }

    /// Delete every user record, keeping the schema.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the transaction fails; nothing
    /// is deleted in that case.
    pub fn clear_all(&self) -> Result<(), UserDataError> {
        self.with_transaction("clear user data", |tx| {
            tx.execute_batch(
                "DELETE FROM favorites;
                 DELETE FROM notes;
                 DELETE FROM checklist_items;
                 DELETE FROM issue_reports;
                 DELETE FROM download_status;",
            )
        })
    }

    fn now(&self) -> String {
        crate::rows::format_timestamp(self.clock.now())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_connection<T>(
        &self,
        operation: &'static str,
        run: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, UserDataError> {
        run(&self.lock()).map_err(|source| UserDataError::Query { operation, source })
    }

    fn with_transaction<T>(
        &self,
        operation: &'static str,
        run: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    ) -> Result<T, UserDataError> {
        let mut connection = self.lock();
        let query = |source| UserDataError::Query { operation, source };
        let transaction = connection.transaction().map_err(query)?;
        let value = run(&transaction).map_err(query)?;
        transaction.commit().map_err(query)?;
        Ok(value)
    }
}
