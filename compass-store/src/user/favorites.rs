use compass_core::{ContentRef, Favorite};
use rusqlite::{Connection, Row, params};

use super::{UserDataError, UserDatabase};
use crate::rows::{text_enum, timestamp};

impl UserDatabase {
    /// Every favourite, newest first.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the table cannot be read.
    pub fn favorites(&self) -> Result<Vec<Favorite>, UserDataError> {
        self.with_connection("list favorites", |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, content_type, content_id, created_at FROM favorites
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], favorite_from_row)?;
            rows.collect()
        })
    }

    /// Save `content` as a favourite; saving it again changes nothing.
    ///
    /// # Errors
    /// Returns [`UserDataError::NotFavoritable`] for tips and phrases and
    /// [`UserDataError::Query`] when the insert fails.
    pub fn add_favorite(&self, content: &ContentRef) -> Result<(), UserDataError> {
        ensure_favoritable(content)?;
        let now = self.now();
        self.with_connection("add favorite", |conn| insert_favorite(conn, content, &now))
    }

    /// Remove `content` from the favourites; removing an absent one succeeds.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the delete fails.
    pub fn remove_favorite(&self, content: &ContentRef) -> Result<(), UserDataError> {
        self.with_connection("remove favorite", |conn| delete_favorite(conn, content))
    }

    /// Whether `content` is saved.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the lookup fails.
    pub fn is_favorite(&self, content: &ContentRef) -> Result<bool, UserDataError> {
        self.with_connection("check favorite", |conn| favorite_exists(conn, content))
    }

    /// Flip the saved state of `content` in one transaction and return the
    /// new state.
    ///
    /// # Errors
    /// Returns [`UserDataError::NotFavoritable`] for tips and phrases and
    /// [`UserDataError::Query`] when the transaction fails.
    pub fn toggle_favorite(&self, content: &ContentRef) -> Result<bool, UserDataError> {
        ensure_favoritable(content)?;
        let now = self.now();
        self.with_transaction("toggle favorite", |tx| {
            if favorite_exists(tx, content)? {
                delete_favorite(tx, content)?;
                Ok(false)
            } else {
                insert_favorite(tx, content, &now)?;
                Ok(true)
            }
        })
    }
}

const fn ensure_favoritable(content: &ContentRef) -> Result<(), UserDataError> {
    if content.content_type.is_favoritable() {
        Ok(())
    } else {
        Err(UserDataError::NotFavoritable {
            content_type: content.content_type,
        })
    }
}

fn insert_favorite(conn: &Connection, content: &ContentRef, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO favorites (content_type, content_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![content.content_type.as_str(), content.content_id, now],
    )
    .map(|_| ())
}

fn delete_favorite(conn: &Connection, content: &ContentRef) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM favorites WHERE content_type = ?1 AND content_id = ?2",
        params![content.content_type.as_str(), content.content_id],
    )
    .map(|_| ())
}

fn favorite_exists(conn: &Connection, content: &ContentRef) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM favorites WHERE content_type = ?1 AND content_id = ?2)",
        params![content.content_type.as_str(), content.content_id],
        |row| row.get(0),
    )
}

fn favorite_from_row(row: &Row<'_>) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        id: row.get("id")?,
        content: ContentRef {
            content_type: text_enum(row, "content_type")?,
            content_id: row.get("content_id")?,
        },
        created_at: timestamp(row, "created_at")?,
    })
}
