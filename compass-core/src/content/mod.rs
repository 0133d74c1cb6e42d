//! Published travel content.
//!
//! Every type here is immutable once a content pack ships it. Places are split
//! into locale-independent facts ([`PlaceBase`]) and per-locale text
//! ([`PlaceI18n`]); the other entities are returned already joined with their
//! text for the locale that resolved.

mod guide;
mod place;

pub use guide::{
    DurationType, Itinerary, ItineraryDay, ItineraryStop, Phrase, PhraseCategory, Pick,
    PickCategory, SafetyLevel, TipSection,
};
pub use place::{
    AccessibilityTag, Contacts, Place, PlaceBase, PlaceCategory, PlaceI18n, PlaceImage,
    PlaceStatus, PriceRange, PriceRangeError,
};
