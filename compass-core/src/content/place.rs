use chrono::{DateTime, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Locale, OpeningHours};

wire_enum! {
    /// Broad kind of venue a place belongs to.
    pub enum PlaceCategory: "place category" {
        /// Restaurant.
        Restaurant => "restaurant",
        /// Café or tea house.
        Cafe => "cafe",
        /// Museum.
        Museum => "museum",
        /// Art gallery.
        Gallery => "gallery",
        /// Traditional courtyard house offering rooms.
        Riad => "riad",
        /// Hotel.
        Hotel => "hotel",
        /// Garden.
        Garden => "garden",
        /// Historic courtyard.
        Courtyard => "courtyard",
        /// Boutique or shop.
        Shopping => "shopping",
        /// Market street.
        Souk => "souk",
        /// Traditional bathhouse.
        Hammam => "hammam",
        /// Spa.
        Spa => "spa",
        /// Monument or landmark.
        Monument => "monument",
    }
}

wire_enum! {
    /// Operating status published with the place.
    #[derive(Default)]
    pub enum PlaceStatus: "place status" {
        /// Operating normally.
        #[default]
        Open => "open",
        /// Closed for now; expected to reopen.
        TemporarilyClosed => "temporarily-closed",
        /// Only operates during part of the year.
        Seasonal => "seasonal",
    }
}

wire_enum! {
    /// Accessibility facts verified for a place.
    pub enum AccessibilityTag: "accessibility tag" {
        /// Wheelchair accessible.
        Wheelchair => "wheelchair",
        /// Reachable without steps.
        StepFree => "step-free",
        /// Suitable for children.
        FamilyFriendly => "family-friendly",
    }
}

/// Error returned when a price band falls outside `1..=4`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("price range {0} is outside 1..=4")]
pub struct PriceRangeError(pub i64);

/// Price band from 1 (budget) to 4 (luxury).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PriceRange(u8);

impl PriceRange {
    /// Cheapest band.
    pub const BUDGET: Self = Self(1);
    /// Most expensive band.
    pub const LUXURY: Self = Self(4);

    /// Numeric band value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for PriceRange {
    type Error = PriceRangeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(band @ 1..=4) => Ok(Self(band)),
            _ => Err(PriceRangeError(value)),
        }
    }
}

impl From<PriceRange> for i64 {
    fn from(range: PriceRange) -> Self {
        Self::from(range.0)
    }
}

/// A responsive image shipped with the content pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceImage {
    /// Path prefix; the width is appended to pick a rendition.
    pub base_path: String,
    /// Available rendition widths in pixels.
    pub widths: Vec<u32>,
    /// Compact placeholder hash shown while loading.
    pub thumbhash: String,
    /// Width divided by height.
    pub aspect_ratio: f64,
    /// Alternative text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Ways to reach a place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contacts {
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Phone number in international form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Website URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Locale-independent facts about a place; one row per place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBase {
    /// Stable content key shared by every locale.
    pub id: String,
    /// URL-safe name.
    pub slug: String,
    /// Venue kind.
    pub category: PlaceCategory,
    /// WGS84 position with `x = longitude` and `y = latitude`.
    pub coordinates: Coord<f64>,
    /// Neighbourhood or quarter, e.g. the medina or Gueliz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    /// Price band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    /// Editorial rating out of 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Image set.
    #[serde(default)]
    pub images: Vec<PlaceImage>,
    /// Weekly schedule with exceptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<OpeningHours>,
    /// Address, phone and website.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Contacts>,
    /// Highlighted by the editors.
    #[serde(default)]
    pub featured: bool,
    /// Operating status.
    #[serde(default)]
    pub status: PlaceStatus,
    /// When the editors last confirmed the details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
    /// Accessibility facts.
    #[serde(default)]
    pub accessibility_tags: Vec<AccessibilityTag>,
}

/// Localised text for one place in one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceI18n {
    /// Place the text belongs to.
    pub place_id: String,
    /// Locale of the text.
    pub locale: Locale,
    /// Display name.
    pub name: String,
    /// Long description.
    pub description: String,
    /// Short visitor tips.
    #[serde(default)]
    pub tips: Vec<String>,
    /// Extra terms that should find this place in search.
    #[serde(default)]
    pub search_keywords: Vec<String>,
}

/// A place as returned to callers: base facts joined with text in the
/// locale that resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Locale-independent facts.
    #[serde(flatten)]
    pub base: PlaceBase,
    /// Text in the resolved locale.
    #[serde(flatten)]
    pub text: PlaceI18n,
}

impl Place {
    /// Stable content key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.base.id
    }

    /// Display name in the resolved locale.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.text.name
    }

    /// Locale the text was resolved in.
    #[must_use]
    pub const fn locale(&self) -> Locale {
        self.text.locale
    }

    /// Whether the place is open at `instant`.
    ///
    /// Places without a schedule, or not currently operating, are reported as
    /// closed.
    ///
    /// # Errors
    /// Propagates [`OpeningHoursError`](crate::OpeningHoursError) from the
    /// schedule.
    pub fn is_open_at(&self, instant: DateTime<Utc>) -> Result<bool, crate::OpeningHoursError> {
        if self.base.status == PlaceStatus::TemporarilyClosed {
            return Ok(false);
        }
        self.base
            .opening_hours
            .as_ref()
            .map_or(Ok(false), |hours| hours.is_open_at(instant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(4, true)]
    #[case(5, false)]
    #[case(-1, false)]
    fn price_range_accepts_one_to_four(#[case] value: i64, #[case] ok: bool) {
        assert_eq!(PriceRange::try_from(value).is_ok(), ok);
    }

    #[rstest]
    fn status_text_matches_schema_values() {
        assert_eq!(PlaceStatus::TemporarilyClosed.as_str(), "temporarily-closed");
        assert_eq!("seasonal".parse::<PlaceStatus>(), Ok(PlaceStatus::Seasonal));
    }

    #[rstest]
    fn closed_places_are_never_open() {
        let place = Place {
            base: PlaceBase {
                id: "p1".into(),
                slug: "le-jardin".into(),
                category: PlaceCategory::Restaurant,
                coordinates: Coord { x: -7.9868, y: 31.6295 },
                neighborhood: None,
                price_range: None,
                rating: None,
                images: Vec::new(),
                opening_hours: Some(OpeningHours {
                    timezone: "Africa/Casablanca".into(),
                    weekly: crate::hours::Weekday::ALL
                        .iter()
                        .map(|day| {
                            (
                                *day,
                                vec![crate::TimeRange {
                                    start: "00:00".parse().expect("start"),
                                    end: "24:00".parse().expect("end"),
                                }],
                            )
                        })
                        .collect(),
                    notes: None,
                    exceptions: Vec::new(),
                }),
                contacts: None,
                featured: false,
                status: PlaceStatus::TemporarilyClosed,
                last_verified_at: None,
                accessibility_tags: Vec::new(),
            },
            text: PlaceI18n {
                place_id: "p1".into(),
                locale: Locale::En,
                name: "Le Jardin".into(),
                description: "Garden restaurant in the medina".into(),
                tips: Vec::new(),
                search_keywords: Vec::new(),
            },
        };
        assert_eq!(place.is_open_at(Utc::now()), Ok(false));
    }
}
