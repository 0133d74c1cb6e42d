//! Full-text place search over `places_fts`.
//!
//! User input never reaches FTS5 verbatim: it is split into alphanumeric
//! terms, each term is quoted, and the last one matches as a prefix so
//! search-as-you-type finds "jardin" from "jard".

use compass_core::{FilterError, Locale, Place, SearchOptions};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use super::places::{FilterSql, PLACE_COLUMNS, place_from_row};

/// Build the FTS5 match expression for a free-text query.
///
/// # Errors
/// Returns [`FilterError::NoSearchTerms`] when the query has no letters or
/// digits.
pub(super) fn match_expression(query: &str) -> Result<String, FilterError> {
    let terms: Vec<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .collect();
    let Some((last, leading)) = terms.split_last() else {
        return Err(FilterError::NoSearchTerms {
            query: query.to_owned(),
        });
    };
    let mut expression: Vec<String> = leading.iter().map(|term| format!("\"{term}\"")).collect();
    expression.push(format!("\"{last}\"*"));
    Ok(expression.join(" "))
}

/// Whether `locale` has any indexed place text.
pub(super) fn has_text(conn: &Connection, locale: Locale) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM places_i18n WHERE locale = ?1)",
        [locale.as_str()],
        |row| row.get(0),
    )
}

/// Places in `locale` matching `expression`, best match first.
///
/// Name hits weigh most, then search keywords, then description and tips.
pub(super) fn ranked(
    conn: &Connection,
    expression: &str,
    locale: Locale,
    options: &SearchOptions,
) -> rusqlite::Result<Vec<Place>> {
    let filters = FilterSql::new(&options.filters);
    let sql = format!(
        "SELECT {PLACE_COLUMNS} FROM places_fts
         JOIN places_i18n i ON i.rowid = places_fts.rowid
         JOIN places_base b ON b.id = i.place_id
         WHERE places_fts MATCH ? AND i.locale = ?{predicates}
         ORDER BY bm25(places_fts, 10.0, 1.0, 1.0, 5.0, 0.0), b.id",
        predicates = filters.predicates()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let params = filters.params_after(vec![
        Value::Text(expression.to_owned()),
        Value::Text(locale.as_str().to_owned()),
    ]);
    let rows = stmt.query_map(params_from_iter(params), place_from_row)?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("garden", "\"garden\"*")]
    #[case("Jardin  Majorelle", "\"Jardin\" \"Majorelle\"*")]
    #[case("riad\" OR 1", "\"riad\" \"OR\" \"1\"*")]
    #[case("café-épices", "\"café\" \"épices\"*")]
    fn queries_become_quoted_terms(#[case] query: &str, #[case] expected: &str) {
        assert_eq!(match_expression(query).expect("terms"), expected);
    }

    #[rstest]
    #[case("***")]
    #[case("\"\"")]
    fn punctuation_only_queries_have_no_terms(#[case] query: &str) {
        assert!(matches!(
            match_expression(query),
            Err(FilterError::NoSearchTerms { .. })
        ));
    }
}
