use compass_core::{ContentRef, Note};
use rusqlite::{OptionalExtension, Row, params};

use super::{UserDataError, UserDatabase};
use crate::rows::{text_enum, timestamp};

const NOTE_COLUMNS: &str = "id, content_type, content_id, note_text, created_at, updated_at";

impl UserDatabase {
    /// Attach a note to `content`.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the insert fails.
    pub fn add_note(&self, content: &ContentRef, text: Option<&str>) -> Result<Note, UserDataError> {
        let now = self.now();
        self.with_connection("add note", |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO notes (content_type, content_id, note_text, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     RETURNING {NOTE_COLUMNS}"
                ),
                params![content.content_type.as_str(), content.content_id, text, now],
                note_from_row,
            )
        })
    }

    /// Replace the text of note `id`. Returns the updated note, or `None`
    /// when it does not exist.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the update fails.
    pub fn update_note(&self, id: i64, text: Option<&str>) -> Result<Option<Note>, UserDataError> {
        let now = self.now();
        self.with_connection("update note", |conn| {
            conn.query_row(
                &format!(
                    "UPDATE notes SET note_text = ?2, updated_at = ?3 WHERE id = ?1
                     RETURNING {NOTE_COLUMNS}"
                ),
                params![id, text, now],
                note_from_row,
            )
            .optional()
        })
    }

    /// Delete note `id`; returns whether it existed.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the delete fails.
    pub fn delete_note(&self, id: i64) -> Result<bool, UserDataError> {
        self.with_connection("delete note", |conn| {
            conn.execute("DELETE FROM notes WHERE id = ?1", [id])
                .map(|changed| changed > 0)
        })
    }

    /// Notes attached to `content`, oldest first.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the table cannot be read.
    pub fn notes_for(&self, content: &ContentRef) -> Result<Vec<Note>, UserDataError> {
        self.with_connection("list notes", |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes
                 WHERE content_type = ?1 AND content_id = ?2
                 ORDER BY created_at, id"
            ))?;
            let rows = stmt.query_map(
                params![content.content_type.as_str(), content.content_id],
                note_from_row,
            )?;
            rows.collect()
        })
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get("id")?,
        content: ContentRef {
            content_type: text_enum(row, "content_type")?,
            content_id: row.get("content_id")?,
        },
        note_text: row.get("note_text")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}
