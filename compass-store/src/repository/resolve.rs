//! Locale fallback resolution over one snapshot connection.

use compass_core::{Locale, LocaleChain};

/// Return the first record any locale in `chain` yields.
pub(super) fn first_found<T>(
    chain: LocaleChain,
    mut lookup: impl FnMut(Locale) -> rusqlite::Result<Option<T>>,
) -> rusqlite::Result<Option<T>> {
    for locale in chain {
        if let Some(found) = lookup(locale)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Return the rows of the first locale in `chain` with any, never a mix.
pub(super) fn first_non_empty<T>(
    chain: LocaleChain,
    mut lookup: impl FnMut(Locale) -> rusqlite::Result<Vec<T>>,
) -> rusqlite::Result<Vec<T>> {
    for locale in chain {
        let rows = lookup(locale)?;
        if !rows.is_empty() {
            return Ok(rows);
        }
    }
    Ok(Vec::new())
}
