use compass_core::ChecklistItem;
use rusqlite::{Row, params};

use super::{UserDataError, UserDatabase};
use crate::rows::timestamp;

const ITEM_COLUMNS: &str = "id, title, completed, sort_order, created_at";

impl UserDatabase {
    /// Append an item to the end of the checklist.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the insert fails.
    pub fn add_checklist_item(&self, title: &str) -> Result<ChecklistItem, UserDataError> {
        let now = self.now();
        self.with_connection("add checklist item", |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO checklist_items (title, completed, sort_order, created_at)
                     SELECT ?1, 0, COALESCE(MAX(sort_order) + 1, 0), ?2 FROM checklist_items
                     RETURNING {ITEM_COLUMNS}"
                ),
                params![title, now],
                item_from_row,
            )
        })
    }

    /// Tick or untick item `id`; returns whether it exists.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the update fails.
    pub fn set_checklist_completed(&self, id: i64, completed: bool) -> Result<bool, UserDataError> {
        self.with_connection("complete checklist item", |conn| {
            conn.execute(
                "UPDATE checklist_items SET completed = ?2 WHERE id = ?1",
                params![id, completed],
            )
            .map(|changed| changed > 0)
        })
    }

    /// Rewrite the order so `ids` appear first-to-last.
    ///
    /// Runs in one transaction; an unknown id aborts the whole reorder.
    ///
    /// # Errors
    /// Returns [`UserDataError::UnknownChecklistItem`] for a missing id and
    /// [`UserDataError::Query`] when the transaction fails.
    pub fn reorder_checklist(&self, ids: &[i64]) -> Result<(), UserDataError> {
        let query = |source| UserDataError::Query {
            operation: "reorder checklist",
            source,
        };
        let mut connection = self.lock();
        let transaction = connection.transaction().map_err(query)?;
        {
            let mut stmt = transaction
                .prepare_cached("UPDATE checklist_items SET sort_order = ?2 WHERE id = ?1")
                .map_err(query)?;
            for (position, id) in (0_i64..).zip(ids) {
                if stmt.execute(params![id, position]).map_err(query)? == 0 {
                    return Err(UserDataError::UnknownChecklistItem { id: *id });
                }
            }
        }
        transaction.commit().map_err(query)
    }

    /// Delete item `id`; returns whether it existed.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the delete fails.
    pub fn delete_checklist_item(&self, id: i64) -> Result<bool, UserDataError> {
        self.with_connection("delete checklist item", |conn| {
            conn.execute("DELETE FROM checklist_items WHERE id = ?1", [id])
                .map(|changed| changed > 0)
        })
    }

    /// The checklist in display order.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the table cannot be read.
    pub fn checklist_items(&self) -> Result<Vec<ChecklistItem>, UserDataError> {
        self.with_connection("list checklist items", |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {ITEM_COLUMNS} FROM checklist_items ORDER BY sort_order, id"
            ))?;
            let rows = stmt.query_map([], item_from_row)?;
            rows.collect()
        })
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ChecklistItem> {
    Ok(ChecklistItem {
        id: row.get("id")?,
        title: row.get("title")?,
        completed: row.get::<_, Option<bool>>("completed")?.unwrap_or(false),
        sort_order: row.get::<_, Option<i64>>("sort_order")?.unwrap_or_default(),
        created_at: timestamp(row, "created_at")?,
    })
}
