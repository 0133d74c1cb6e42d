use compass_core::{ContentRef, IssueReport, ReportType};
use rusqlite::{Row, params};

use super::{UserDataError, UserDatabase};
use crate::rows::{text_enum, timestamp};

const REPORT_COLUMNS: &str = "id, content_type, content_id, report_type, details, created_at, synced";

impl UserDatabase {
    /// Queue a problem report about `content` for upstream delivery.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the insert fails.
    pub fn report_issue(
        &self,
        content: &ContentRef,
        report_type: ReportType,
        details: Option<&str>,
    ) -> Result<IssueReport, UserDataError> {
        let now = self.now();
        self.with_connection("report issue", |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO issue_reports
                        (content_type, content_id, report_type, details, created_at, synced)
                     VALUES (?1, ?2, ?3, ?4, ?5, 0)
                     RETURNING {REPORT_COLUMNS}"
                ),
                params![
                    content.content_type.as_str(),
                    content.content_id,
                    report_type.as_str(),
                    details,
                    now
                ],
                report_from_row,
            )
        })
    }

    /// Reports not yet delivered, oldest first.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the table cannot be read.
    pub fn unsynced_issue_reports(&self) -> Result<Vec<IssueReport>, UserDataError> {
        self.with_connection("list unsynced issue reports", |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {REPORT_COLUMNS} FROM issue_reports
                 WHERE COALESCE(synced, 0) = 0 ORDER BY id"
            ))?;
            let rows = stmt.query_map([], report_from_row)?;
            rows.collect()
        })
    }

    /// Mark the given reports delivered; returns how many changed.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the transaction fails; no report
    /// is marked in that case.
    pub fn mark_issue_reports_synced(&self, ids: &[i64]) -> Result<usize, UserDataError> {
        self.with_transaction("mark issue reports synced", |tx| {
            let mut stmt =
                tx.prepare_cached("UPDATE issue_reports SET synced = 1 WHERE id = ?1 AND synced = 0")?;
            ids.iter()
                .try_fold(0, |total, id| Ok(total + stmt.execute([id])?))
        })
    }
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<IssueReport> {
    Ok(IssueReport {
        id: row.get("id")?,
        content: ContentRef {
            content_type: text_enum(row, "content_type")?,
            content_id: row.get("content_id")?,
        },
        report_type: text_enum(row, "report_type")?,
        details: row.get("details")?,
        created_at: timestamp(row, "created_at")?,
        synced: row.get::<_, Option<bool>>("synced")?.unwrap_or(false),
    })
}
