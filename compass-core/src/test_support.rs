//! Deterministic content builders shared by unit and behaviour tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::Coord;

use crate::{
    ClockTime, Locale, OpeningHours, PlaceBase, PlaceCategory, PlaceI18n, PlaceStatus, TimeRange,
    Weekday,
};

/// Timezone used by every fixture schedule.
pub const MARRAKECH_TZ: &str = "Africa/Casablanca";

/// A minimal place in the medina with no schedule.
#[must_use]
pub fn place_base(id: &str, category: PlaceCategory) -> PlaceBase {
    PlaceBase {
        id: id.to_owned(),
        slug: id.to_owned(),
        category,
        coordinates: Coord {
            x: -7.9891,
            y: 31.6258,
        },
        neighborhood: Some("medina".to_owned()),
        price_range: None,
        rating: None,
        images: Vec::new(),
        opening_hours: None,
        contacts: None,
        featured: false,
        status: PlaceStatus::Open,
        last_verified_at: None,
        accessibility_tags: Vec::new(),
    }
}

/// Localised text for `place_id` with no tips or keywords.
#[must_use]
pub fn place_text(place_id: &str, locale: Locale, name: &str, description: &str) -> PlaceI18n {
    PlaceI18n {
        place_id: place_id.to_owned(),
        locale,
        name: name.to_owned(),
        description: description.to_owned(),
        tips: Vec::new(),
        search_keywords: Vec::new(),
    }
}

/// Every day of the week open between `start` and `end` (`HH:MM`).
///
/// Returns `None` when either bound is malformed.
#[must_use]
pub fn daily_hours(start: &str, end: &str) -> Option<OpeningHours> {
    let range = TimeRange {
        start: start.parse::<ClockTime>().ok()?,
        end: end.parse::<ClockTime>().ok()?,
    };
    let weekly: BTreeMap<Weekday, Vec<TimeRange>> = Weekday::ALL
        .iter()
        .map(|day| (*day, vec![range]))
        .collect();
    Some(OpeningHours {
        timezone: MARRAKECH_TZ.to_owned(),
        weekly,
        notes: None,
        exceptions: Vec::new(),
    })
}

/// Parse an RFC 3339 instant for a fixed clock.
///
/// Returns `None` when `text` is not a valid timestamp.
#[must_use]
pub fn instant(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}
