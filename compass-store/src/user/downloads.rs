use compass_core::{DownloadState, DownloadStatus, PackType};
use rusqlite::{OptionalExtension, Row, params};

use super::{UserDataError, UserDatabase};
use crate::rows::{format_timestamp, text_enum, timestamp};

const STATUS_COLUMNS: &str = "pack_id, pack_type, status, progress, size_bytes, downloaded_bytes, \
                              error_message, updated_at";

impl UserDatabase {
    /// Insert or replace the status row for `status.pack_id`.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the upsert fails.
    pub fn record_download_status(&self, status: &DownloadStatus) -> Result<(), UserDataError> {
        let size = status.size_bytes.map(saturating_i64);
        self.with_connection("record download status", |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO download_status ({STATUS_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(pack_id) DO UPDATE SET
                        pack_type = excluded.pack_type,
                        status = excluded.status,
                        progress = excluded.progress,
                        size_bytes = excluded.size_bytes,
                        downloaded_bytes = excluded.downloaded_bytes,
                        error_message = excluded.error_message,
                        updated_at = excluded.updated_at"
                ),
                params![
                    status.pack_id,
                    status.pack_type.as_str(),
                    status.status.as_str(),
                    status.progress.clamp(0.0, 1.0),
                    size,
                    saturating_i64(status.downloaded_bytes),
                    status.error_message,
                    format_timestamp(status.updated_at),
                ],
            )
            .map(|_| ())
        })
    }

    /// Move `pack_id` to `state`, keeping its byte counters.
    ///
    /// A pack seen for the first time starts from zero. Reaching
    /// [`DownloadState::Ready`] pins progress at 1; `error` replaces any
    /// previous message, so passing `None` clears it.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the status cannot be written.
    pub fn set_download_state(
        &self,
        pack_id: &str,
        pack_type: PackType,
        state: DownloadState,
        error: Option<&str>,
    ) -> Result<DownloadStatus, UserDataError> {
        let now = self.clock.now();
        let mut status = self
            .download_status(pack_id)?
            .unwrap_or_else(|| DownloadStatus::pending(pack_id, pack_type, now));
        status.pack_type = pack_type;
        status.status = state;
        status.error_message = error.map(str::to_owned);
        status.updated_at = now;
        if state == DownloadState::Ready {
            status.progress = 1.0;
        }
        self.record_download_status(&status)?;
        Ok(status)
    }

    /// Record bytes transferred for a downloading pack.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the status cannot be written.
    pub fn record_download_progress(
        &self,
        pack_id: &str,
        pack_type: PackType,
        downloaded_bytes: u64,
        size_bytes: Option<u64>,
    ) -> Result<DownloadStatus, UserDataError> {
        let now = self.clock.now();
        let mut status = self
            .download_status(pack_id)?
            .unwrap_or_else(|| DownloadStatus::pending(pack_id, pack_type, now));
        status.pack_type = pack_type;
        status.status = DownloadState::Downloading;
        status.downloaded_bytes = downloaded_bytes;
        status.size_bytes = size_bytes.or(status.size_bytes);
        status.progress = fraction(downloaded_bytes, status.size_bytes);
        status.error_message = None;
        status.updated_at = now;
        self.record_download_status(&status)?;
        Ok(status)
    }

    /// Status of one pack, if it was ever recorded.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the lookup fails.
    pub fn download_status(&self, pack_id: &str) -> Result<Option<DownloadStatus>, UserDataError> {
        self.with_connection("read download status", |conn| {
            conn.query_row(
                &format!("SELECT {STATUS_COLUMNS} FROM download_status WHERE pack_id = ?1"),
                [pack_id],
                status_from_row,
            )
            .optional()
        })
    }

    /// Every recorded pack status, ordered by pack id.
    ///
    /// # Errors
    /// Returns [`UserDataError::Query`] when the table cannot be read.
    pub fn download_statuses(&self) -> Result<Vec<DownloadStatus>, UserDataError> {
        self.with_connection("list download statuses", |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {STATUS_COLUMNS} FROM download_status ORDER BY pack_id"
            ))?;
            let rows = stmt.query_map([], status_from_row)?;
            rows.collect()
        })
    }
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "progress is an approximate display fraction"
)]
const fn fraction(done: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => (done as f64 / total as f64).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadStatus> {
    Ok(DownloadStatus {
        pack_id: row.get("pack_id")?,
        pack_type: text_enum(row, "pack_type")?,
        status: text_enum(row, "status")?,
        progress: row.get::<_, Option<f64>>("progress")?.unwrap_or_default(),
        size_bytes: row.get::<_, Option<i64>>("size_bytes")?.map(non_negative),
        downloaded_bytes: row
            .get::<_, Option<i64>>("downloaded_bytes")?
            .map(non_negative)
            .unwrap_or_default(),
        error_message: row.get("error_message")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

#[cfg(test)]
mod progress_tests {
    use super::fraction;
    use rstest::rstest;

    #[rstest]
    #[case(50, Some(200), 0.25)]
    #[case(10, None, 0.0)]
    #[case(10, Some(0), 0.0)]
    #[case(300, Some(200), 1.0)]
    fn progress_is_a_clamped_fraction(#[case] done: u64, #[case] total: Option<u64>, #[case] expected: f64) {
        assert_eq!(fraction(done, total).to_bits(), expected.to_bits());
    }
}
