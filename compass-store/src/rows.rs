//! Column decoding shared by the content and user queries.
//!
//! Enumerations, JSON payloads and timestamps are stored as text. Decoding
//! failures surface as `FromSqlConversionFailure` naming the offending
//! column, the same error `rusqlite` raises for mistyped columns.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use compass_core::UnknownVariant;
use rusqlite::Row;
use rusqlite::types::{FromSql, Type};
use serde::Serialize;
use serde::de::DeserializeOwned;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn conversion_failure(row: &Row<'_>, name: &str, err: impl Into<BoxedError>) -> rusqlite::Error {
    let index = row.as_ref().column_index(name).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, err.into())
}

/// Decode a text column into a wire enumeration.
pub(crate) fn text_enum<T>(row: &Row<'_>, name: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let text: String = row.get(name)?;
    text.parse().map_err(|err| conversion_failure(row, name, err))
}

/// Read a column and pass it through a fallible conversion.
pub(crate) fn decode<S, T, E>(
    row: &Row<'_>,
    name: &str,
    convert: impl FnOnce(S) -> Result<T, E>,
) -> rusqlite::Result<T>
where
    S: FromSql,
    E: Into<BoxedError>,
{
    let raw: S = row.get(name)?;
    convert(raw).map_err(|err| conversion_failure(row, name, err))
}

/// Decode a nullable JSON column.
pub(crate) fn json_opt<T: DeserializeOwned>(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(name)?;
    text.map(|json| serde_json::from_str(&json).map_err(|err| conversion_failure(row, name, err)))
        .transpose()
}

/// Decode a JSON column, treating `NULL` as the type's default.
pub(crate) fn json_or_default<T>(row: &Row<'_>, name: &str) -> rusqlite::Result<T>
where
    T: DeserializeOwned + Default,
{
    json_opt(row, name).map(Option::unwrap_or_default)
}

/// Decode a required JSON column.
pub(crate) fn json<T: DeserializeOwned>(row: &Row<'_>, name: &str) -> rusqlite::Result<T> {
    let text: String = row.get(name)?;
    serde_json::from_str(&text).map_err(|err| conversion_failure(row, name, err))
}

/// Decode an RFC 3339 timestamp column.
pub(crate) fn timestamp(row: &Row<'_>, name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(name)?;
    parse_timestamp(&text).map_err(|err| conversion_failure(row, name, err))
}

/// Decode a nullable RFC 3339 timestamp column.
pub(crate) fn timestamp_opt(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(name)?;
    text.map(|value| parse_timestamp(&value).map_err(|err| conversion_failure(row, name, err)))
        .transpose()
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|value| value.with_timezone(&Utc))
}

/// Text form used for every stored timestamp; sorts chronologically.
pub(crate) fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encode a value for a JSON column.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::Locale;
    use rstest::rstest;
    use rusqlite::Connection;

    fn decode_locale(sql: &str) -> rusqlite::Result<Locale> {
        let conn = Connection::open_in_memory().expect("open database");
        conn.query_row(sql, [], |row| text_enum(row, "locale"))
    }

    #[rstest]
    fn decodes_known_enum_text() {
        assert_eq!(decode_locale("SELECT 'fr' AS locale").expect("decode"), Locale::Fr);
    }

    #[rstest]
    fn unknown_enum_text_names_the_column() {
        let err = decode_locale("SELECT 1 AS other, 'pt' AS locale").expect_err("unknown locale");
        assert!(matches!(
            err,
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, _)
        ));
    }

    #[rstest]
    fn timestamps_round_trip_through_text() {
        let instant = DateTime::parse_from_rfc3339("2026-06-01T08:00:00Z")
            .expect("parse")
            .with_timezone(&Utc);
        let text = format_timestamp(instant);
        assert_eq!(text, "2026-06-01T08:00:00.000Z");
        assert_eq!(parse_timestamp(&text).expect("reparse"), instant);
    }
}
