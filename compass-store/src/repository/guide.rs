//! Itinerary, pick, tip and phrase queries.
//!
//! Each entity is a base table joined to its `*_i18n` text table; one
//! [`EntityQuery`] describes the join so single and collection reads share
//! the same projection and decoder.

use compass_core::{Itinerary, Locale, Phrase, Pick, TipSection};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::rows::{json, json_or_default, text_enum, timestamp};

/// A base table joined with its localised text.
#[derive(Debug)]
pub(super) struct EntityQuery<T> {
    /// `SELECT ... FROM base e JOIN text t ON ...`; `t.locale` is filtered on.
    select: &'static str,
    order_by: &'static str,
    decode: fn(&Row<'_>) -> rusqlite::Result<T>,
}

impl<T> EntityQuery<T> {
    /// Entity `id` with text in exactly `locale`.
    pub(super) fn find(
        &self,
        conn: &Connection,
        id: &str,
        locale: Locale,
    ) -> rusqlite::Result<Option<T>> {
        let sql = format!("{} WHERE e.id = ?1 AND t.locale = ?2", self.select);
        conn.query_row(&sql, params![id, locale.as_str()], self.decode)
            .optional()
    }

    /// Every entity with text in `locale`, optionally restricted to rows
    /// whose `column` equals `value`.
    pub(super) fn list(
        &self,
        conn: &Connection,
        locale: Locale,
        filter: Option<(&'static str, &str)>,
    ) -> rusqlite::Result<Vec<T>> {
        let mut stmt;
        let rows = match filter {
            Some((column, value)) => {
                stmt = conn.prepare_cached(&format!(
                    "{} WHERE t.locale = ?1 AND e.{column} = ?2 ORDER BY {}",
                    self.select, self.order_by
                ))?;
                stmt.query_map(params![locale.as_str(), value], self.decode)?
            }
            None => {
                stmt = conn.prepare_cached(&format!(
                    "{} WHERE t.locale = ?1 ORDER BY {}",
                    self.select, self.order_by
                ))?;
                stmt.query_map(params![locale.as_str()], self.decode)?
            }
        };
        rows.collect()
    }
}

pub(super) const ITINERARIES: EntityQuery<Itinerary> = EntityQuery {
    select: "SELECT e.id, e.duration_type, t.locale, t.title, t.description, t.days
             FROM itineraries e JOIN itineraries_i18n t ON t.itinerary_id = e.id",
    order_by: "e.id",
    decode: itinerary_from_row,
};

pub(super) const PICKS: EntityQuery<Pick> = EntityQuery {
    select: "SELECT e.id, e.category, e.place_id, e.images, t.locale, t.title, t.tagline,
                    t.why_we_love_it
             FROM picks e JOIN picks_i18n t ON t.pick_id = e.id",
    order_by: "e.id",
    decode: pick_from_row,
};

pub(super) const TIPS: EntityQuery<TipSection> = EntityQuery {
    select: "SELECT e.id, e.icon, e.last_reviewed_at, e.safety_level, e.source_refs, t.locale,
                    t.title, t.content
             FROM tips e JOIN tips_i18n t ON t.tip_id = e.id",
    order_by: "e.id",
    decode: tip_from_row,
};

pub(super) const PHRASES: EntityQuery<Phrase> = EntityQuery {
    select: "SELECT e.id, e.category, e.english, e.darija, e.darija_latin, e.french,
                    e.audio_path, t.locale, t.gloss
             FROM phrases e JOIN phrases_i18n t ON t.phrase_id = e.id",
    order_by: "e.sort_order, e.id",
    decode: phrase_from_row,
};

fn itinerary_from_row(row: &Row<'_>) -> rusqlite::Result<Itinerary> {
    Ok(Itinerary {
        id: row.get("id")?,
        duration_type: text_enum(row, "duration_type")?,
        locale: text_enum(row, "locale")?,
        title: row.get("title")?,
        description: row.get("description")?,
        days: json(row, "days")?,
    })
}

fn pick_from_row(row: &Row<'_>) -> rusqlite::Result<Pick> {
    Ok(Pick {
        id: row.get("id")?,
        category: text_enum(row, "category")?,
        place_id: row.get("place_id")?,
        locale: text_enum(row, "locale")?,
        title: row.get("title")?,
        tagline: row.get("tagline")?,
        why_we_love_it: row.get("why_we_love_it")?,
        images: json(row, "images")?,
    })
}

fn tip_from_row(row: &Row<'_>) -> rusqlite::Result<TipSection> {
    Ok(TipSection {
        id: row.get("id")?,
        icon: row.get("icon")?,
        locale: text_enum(row, "locale")?,
        title: row.get("title")?,
        content: json(row, "content")?,
        last_reviewed_at: timestamp(row, "last_reviewed_at")?,
        source_refs: json_or_default(row, "source_refs")?,
        safety_level: text_enum(row, "safety_level")?,
    })
}

fn phrase_from_row(row: &Row<'_>) -> rusqlite::Result<Phrase> {
    Ok(Phrase {
        id: row.get("id")?,
        category: text_enum(row, "category")?,
        locale: text_enum(row, "locale")?,
        english: row.get("english")?,
        darija: row.get("darija")?,
        darija_latin: row.get("darija_latin")?,
        french: row.get("french")?,
        audio_path: row.get("audio_path")?,
        gloss: row.get("gloss")?,
    })
}
