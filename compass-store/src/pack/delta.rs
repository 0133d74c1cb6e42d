//! Delta application: patch a copy of the active content database with the
//! rows and tombstones of a delta pack.

use compass_core::ContentType;
use rusqlite::{Connection, OptionalExtension};

use super::SwapError;
use crate::schema::{CONTENT_SCHEMA_VERSION, META_SCHEMA_VERSION};

/// One localised entity: its base table and its text table.
pub(super) struct EntityTables {
    pub(super) entity: ContentType,
    pub(super) base: &'static str,
    pub(super) base_columns: &'static str,
    pub(super) text: &'static str,
    pub(super) text_key: &'static str,
    pub(super) text_columns: &'static str,
}

pub(super) const ENTITY_TABLES: [EntityTables; 5] = [
    EntityTables {
        entity: ContentType::Place,
        base: "places_base",
        base_columns: "id, slug, category, lat, lng, neighborhood, price_range, rating, images, \
                       opening_hours, contacts, featured, status, last_verified_at, \
                       accessibility_tags",
        text: "places_i18n",
        text_key: "place_id",
        text_columns: "place_id, locale, name, description, tips, search_keywords",
    },
    EntityTables {
        entity: ContentType::Itinerary,
        base: "itineraries",
        base_columns: "id, duration_type",
        text: "itineraries_i18n",
        text_key: "itinerary_id",
        text_columns: "itinerary_id, locale, title, description, days",
    },
    EntityTables {
        entity: ContentType::Pick,
        base: "picks",
        base_columns: "id, category, place_id, images",
        text: "picks_i18n",
        text_key: "pick_id",
        text_columns: "pick_id, locale, title, tagline, why_we_love_it",
    },
    EntityTables {
        entity: ContentType::Tip,
        base: "tips",
        base_columns: "id, icon, last_reviewed_at, safety_level, source_refs",
        text: "tips_i18n",
        text_key: "tip_id",
        text_columns: "tip_id, locale, title, content",
    },
    EntityTables {
        entity: ContentType::Phrase,
        base: "phrases",
        base_columns: "id, category, english, darija, darija_latin, french, audio_path, sort_order",
        text: "phrases_i18n",
        text_key: "phrase_id",
        text_columns: "phrase_id, locale, gloss",
    },
];

/// Row counts touched by a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaSummary {
    /// Base and text rows inserted or replaced.
    pub upserted: usize,
    /// Base and text rows removed by tombstones.
    pub removed: usize,
}

/// Apply the delta database at `delta_path` to `conn`.
///
/// Upserts run before tombstones so a delta may both replace and retire
/// rows; the whole patch is one transaction.
pub(super) fn apply_delta(conn: &mut Connection, delta_path: &str) -> Result<DeltaSummary, SwapError> {
    conn.execute("ATTACH DATABASE ?1 AS delta", [delta_path])
        .map_err(build("attach delta database"))?;
    let applied = apply_attached(conn);
    let detached = conn
        .execute("DETACH DATABASE delta", [])
        .map_err(build("detach delta database"));
    let summary = applied?;
    detached?;
    Ok(summary)
}

fn apply_attached(conn: &mut Connection) -> Result<DeltaSummary, SwapError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT value FROM delta.content_meta WHERE key = ?1",
            [META_SCHEMA_VERSION],
            |row| row.get(0),
        )
        .optional()
        .map_err(build("read delta schema version"))?;
    if found.as_deref().and_then(|v| v.parse::<i64>().ok()) != Some(CONTENT_SCHEMA_VERSION) {
        return Err(SwapError::DeltaSchema {
            found: found.unwrap_or_default(),
        });
    }

    let tx = conn.transaction().map_err(build("begin delta transaction"))?;
    let mut summary = DeltaSummary::default();
    for tables in &ENTITY_TABLES {
        for (table, columns) in [
            (tables.base, tables.base_columns),
            (tables.text, tables.text_columns),
        ] {
            summary.upserted += tx
                .execute(
                    &format!(
                        "INSERT OR REPLACE INTO main.{table} ({columns})
                         SELECT {columns} FROM delta.{table}"
                    ),
                    [],
                )
                .map_err(build("upsert delta rows"))?;
        }
    }
    for tables in &ENTITY_TABLES {
        let retired = "SELECT id FROM delta.pack_tombstones WHERE entity = ?1";
        let entity = tables.entity.as_str();
        summary.removed += tx
            .execute(
                &format!(
                    "DELETE FROM main.{} WHERE {} IN ({retired})",
                    tables.text, tables.text_key
                ),
                [entity],
            )
            .map_err(build("apply text tombstones"))?;
        summary.removed += tx
            .execute(
                &format!("DELETE FROM main.{} WHERE id IN ({retired})", tables.base),
                [entity],
            )
            .map_err(build("apply tombstones"))?;
    }
    tx.commit().map_err(build("commit delta transaction"))?;
    Ok(summary)
}

/// Describe every referential problem in a built content database.
///
/// Text rows must belong to a base row, and every base row needs English
/// text so the fallback chain always resolves.
pub(super) fn reference_problems(conn: &Connection) -> Result<Vec<String>, SwapError> {
    let mut problems = Vec::new();
    for tables in &ENTITY_TABLES {
        let orphans: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {text} t
                     WHERE NOT EXISTS (SELECT 1 FROM {base} e WHERE e.id = t.{key})",
                    text = tables.text,
                    base = tables.base,
                    key = tables.text_key
                ),
                [],
                |row| row.get(0),
            )
            .map_err(build("check orphan text rows"))?;
        if orphans > 0 {
            problems.push(format!("{orphans} {} rows have no {} row", tables.text, tables.base));
        }
        let untranslated: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {base} e
                     WHERE NOT EXISTS (
                        SELECT 1 FROM {text} t WHERE t.{key} = e.id AND t.locale = 'en'
                     )",
                    text = tables.text,
                    base = tables.base,
                    key = tables.text_key
                ),
                [],
                |row| row.get(0),
            )
            .map_err(build("check english text"))?;
        if untranslated > 0 {
            problems.push(format!(
                "{untranslated} {} rows have no English text",
                tables.base
            ));
        }
    }
    Ok(problems)
}

pub(super) fn build(operation: &'static str) -> impl Fn(rusqlite::Error) -> SwapError {
    move |source| SwapError::Build { operation, source }
}
