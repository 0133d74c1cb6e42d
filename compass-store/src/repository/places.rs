//! Place queries: one join of `places_base` and `places_i18n` per locale.

use chrono::{DateTime, Utc};
use compass_core::{Locale, Place, PlaceBase, PlaceFilters, PlaceI18n, PriceRange};
use geo::Coord;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::rows::{decode, json_opt, json_or_default, text_enum, timestamp_opt};

/// Columns selected for every place query; `b` is the base row, `i` the text.
pub(super) const PLACE_COLUMNS: &str = "b.id, b.slug, b.category, b.lat, b.lng, b.neighborhood, \
     b.price_range, b.rating, b.images, b.opening_hours, b.contacts, b.featured, b.status, \
     b.last_verified_at, b.accessibility_tags, \
     i.place_id, i.locale, i.name, i.description, i.tips, i.search_keywords";

const PLACE_ORDER: &str = "b.featured DESC, b.rating DESC, b.id";

/// Fetch place `id` with its text in exactly `locale`.
pub(super) fn find(conn: &Connection, id: &str, locale: Locale) -> rusqlite::Result<Option<Place>> {
    conn.query_row(
        &format!(
            "SELECT {PLACE_COLUMNS} FROM places_base b
             JOIN places_i18n i ON i.place_id = b.id
             WHERE b.id = ?1 AND i.locale = ?2"
        ),
        params![id, locale.as_str()],
        place_from_row,
    )
    .optional()
}

/// SQL predicates and parameters for the column filters of a place query.
///
/// `open_now` and pagination are not expressible in SQL and are applied by
/// [`retain_open`] and [`paginate`].
#[derive(Debug, Default)]
pub(super) struct FilterSql {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl FilterSql {
    pub(super) fn new(filters: &PlaceFilters) -> Self {
        let mut sql = Self::default();
        if let Some(category) = filters.category {
            sql.push("b.category = ?", [Value::Text(category.as_str().to_owned())]);
        }
        if let Some(neighborhood) = &filters.neighborhood {
            sql.push(
                "b.neighborhood = ? COLLATE NOCASE",
                [Value::Text(neighborhood.trim().to_owned())],
            );
        }
        if let Some(rating) = filters.min_rating {
            sql.push("b.rating >= ?", [Value::Real(rating)]);
        }
        if let Some(featured) = filters.featured {
            sql.push("b.featured = ?", [Value::Integer(i64::from(featured))]);
        }
        if let Some(bands) = &filters.price_ranges {
            let marks = vec!["?"; bands.len()].join(", ");
            sql.push(
                format!("b.price_range IN ({marks})"),
                bands.iter().map(|band| Value::Integer(i64::from(*band))),
            );
        }
        sql
    }

    fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(values);
    }

    /// The predicates, each preceded by `AND`.
    pub(super) fn predicates(&self) -> String {
        self.clauses.iter().fold(String::new(), |mut out, clause| {
            out.push_str(" AND ");
            out.push_str(clause);
            out
        })
    }

    /// Parameters in predicate order, after `leading`.
    pub(super) fn params_after(&self, leading: Vec<Value>) -> Vec<Value> {
        let mut all = leading;
        all.extend(self.params.iter().cloned());
        all
    }
}

/// Every place with text in `locale` passing the column filters, in display
/// order.
pub(super) fn list(
    conn: &Connection,
    locale: Locale,
    filters: &FilterSql,
) -> rusqlite::Result<Vec<Place>> {
    let sql = format!(
        "SELECT {PLACE_COLUMNS} FROM places_base b
         JOIN places_i18n i ON i.place_id = b.id
         WHERE i.locale = ?{predicates}
         ORDER BY {PLACE_ORDER}",
        predicates = filters.predicates()
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let params = filters.params_after(vec![Value::Text(locale.as_str().to_owned())]);
    let rows = stmt.query_map(params_from_iter(params), place_from_row)?;
    rows.collect()
}

/// Drop places closed at `now` when the filter asks for open ones.
///
/// A schedule that cannot be evaluated counts as closed.
pub(super) fn retain_open(places: &mut Vec<Place>, filters: &PlaceFilters, now: DateTime<Utc>) {
    if !filters.open_now {
        return;
    }
    places.retain(|place| match place.is_open_at(now) {
        Ok(open) => open,
        Err(err) => {
            warn!("treating place {} as closed: {err}", place.id());
            false
        }
    });
}

/// Apply `offset` then `limit` to an ordered result.
pub(super) fn paginate(places: Vec<Place>, offset: u32, limit: Option<u32>) -> Vec<Place> {
    let skip = usize::try_from(offset).unwrap_or(usize::MAX);
    let take = limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
    places.into_iter().skip(skip).take(take).collect()
}

pub(super) fn place_from_row(row: &Row<'_>) -> rusqlite::Result<Place> {
    let base = PlaceBase {
        id: row.get("id")?,
        slug: row.get("slug")?,
        category: text_enum(row, "category")?,
        coordinates: Coord {
            x: row.get("lng")?,
            y: row.get("lat")?,
        },
        neighborhood: row.get("neighborhood")?,
        price_range: decode(row, "price_range", |band: Option<i64>| {
            band.map(PriceRange::try_from).transpose()
        })?,
        rating: row.get("rating")?,
        images: json_or_default(row, "images")?,
        opening_hours: json_opt(row, "opening_hours")?,
        contacts: json_opt(row, "contacts")?,
        featured: row.get("featured")?,
        status: text_enum(row, "status")?,
        last_verified_at: timestamp_opt(row, "last_verified_at")?,
        accessibility_tags: json_or_default(row, "accessibility_tags")?,
    };
    let text = PlaceI18n {
        place_id: row.get("place_id")?,
        locale: text_enum(row, "locale")?,
        name: row.get("name")?,
        description: row.get("description")?,
        tips: json_or_default(row, "tips")?,
        search_keywords: json_or_default(row, "search_keywords")?,
    };
    Ok(Place { base, text })
}
