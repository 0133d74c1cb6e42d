//! Core domain types for the Marrakech Compass offline data layer.
//!
//! This crate holds everything that does not touch storage: the supported
//! locales and their fallback chains, the published content and user record
//! models, query filters, opening-hours evaluation, the content pack
//! manifest, and the [`Repository`] contract implemented by the storage
//! crate.

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod macros;

mod clock;
pub mod content;
mod filters;
pub mod hours;
mod locale;
mod manifest;
mod repository;
pub mod user;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

use thiserror::Error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use content::{
    AccessibilityTag, Contacts, DurationType, Itinerary, ItineraryDay, ItineraryStop, Phrase,
    PhraseCategory, Pick, PickCategory, Place, PlaceBase, PlaceCategory, PlaceI18n, PlaceImage,
    PlaceStatus, PriceRange, PriceRangeError, SafetyLevel, TipSection,
};
pub use filters::{DEFAULT_SEARCH_LIMIT, FilterError, PlaceFilters, SearchOptions};
pub use hours::{ClockTime, HoursException, OpeningHours, OpeningHoursError, TimeRange, Weekday};
pub use locale::{
    DEFAULT_LOCALE, FALLBACK_LOCALE, Locale, LocaleChain, fallback_chain, is_valid_locale,
};
pub use manifest::{AppVersion, AppVersionError, CONTENT_DB_FILE, ContentManifest};
pub use repository::{ContentVersion, Repository};
pub use user::{
    ChecklistItem, ContentRef, ContentType, DownloadState, DownloadStatus, Favorite,
    IssueReport, Note, PackType, ReportType,
};

/// Error returned when text does not name a known enumeration value.
///
/// # Examples
///
/// ```
/// use compass_core::{Locale, PlaceCategory};
///
/// let err = "pt".parse::<Locale>().unwrap_err();
/// assert_eq!(err.to_string(), "unknown locale 'pt'");
/// assert!("riad".parse::<PlaceCategory>().is_ok());
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Human-readable name of the enumeration.
    pub kind: &'static str,
    /// Rejected text.
    pub value: String,
}

impl UnknownVariant {
    /// Record a rejected `value` for the enumeration named `kind`.
    #[must_use]
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
