use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Locale;

wire_enum! {
    /// Length of an itinerary.
    pub enum DurationType: "duration type" {
        /// A single day.
        OneDay => "1day",
        /// Two days.
        Weekend => "weekend",
        /// Three or four days.
        LongWeekend => "long-weekend",
        /// A full week.
        OneWeek => "1week",
    }
}

wire_enum! {
    /// Editorial grouping for curated picks.
    pub enum PickCategory: "pick category" {
        /// Architecture.
        Architecture => "architecture",
        /// The Djemaa el-Fna square.
        DjemaaElFna => "djemaa-el-fna",
        /// Shopping.
        Shopping => "shopping",
        /// Food.
        Cuisine => "cuisine",
        /// Where to stay.
        Stay => "stay",
        /// Lesser-known spots.
        HiddenGem => "hidden-gem",
        /// Rooftop terraces.
        RooftopView => "rooftop-view",
        /// Art and design.
        ArtDesign => "art-design",
        /// Cultural venues.
        Cultural => "cultural",
        /// Museums.
        Museum => "museum",
        /// Gueliz and Hivernage.
        NewTown => "new-town",
        /// Bathhouses.
        Hammam => "hammam",
    }
}

wire_enum! {
    /// How urgently a tip section should be surfaced.
    #[derive(Default)]
    pub enum SafetyLevel: "safety level" {
        /// Background advice.
        #[default]
        General => "general",
        /// Worth reading before arrival.
        Important => "important",
        /// Safety critical.
        Critical => "critical",
    }
}

wire_enum! {
    /// Situation a phrase is useful in.
    pub enum PhraseCategory: "phrase category" {
        /// Greetings.
        Greeting => "greeting",
        /// Bargaining and shopping.
        Shopping => "shopping",
        /// Asking the way.
        Directions => "directions",
        /// Ordering food.
        Food => "food",
        /// Emergencies.
        Emergency => "emergency",
        /// Taxis and buses.
        Transport => "transport",
        /// Politeness.
        Courtesy => "courtesy",
    }
}

/// A visit scheduled within an itinerary day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryStop {
    /// Place visited; may dangle after a content update.
    pub place_id: String,
    /// Human-readable slot, e.g. "Morning".
    pub time_slot: String,
    /// Editorial notes for the stop.
    pub notes: String,
}

/// One day of an itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    /// One-based day number.
    pub day_number: u8,
    /// Title for the day.
    pub title: String,
    /// Ordered stops.
    pub stops: Vec<ItineraryStop>,
}

/// A suggested multi-stop route, localised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    /// Stable content key.
    pub id: String,
    /// Length of the itinerary.
    pub duration_type: DurationType,
    /// Locale the text resolved in.
    pub locale: Locale,
    /// Title.
    pub title: String,
    /// Summary.
    pub description: String,
    /// Day-by-day plan.
    pub days: Vec<ItineraryDay>,
}

/// An editor's pick pointing at a place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pick {
    /// Stable content key.
    pub id: String,
    /// Editorial grouping.
    pub category: PickCategory,
    /// Place the pick recommends.
    pub place_id: String,
    /// Locale the text resolved in.
    pub locale: Locale,
    /// Headline.
    pub title: String,
    /// One-line hook.
    pub tagline: String,
    /// Longer editorial justification.
    pub why_we_love_it: String,
    /// Image paths.
    pub images: Vec<String>,
}

/// A section of practical travel advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TipSection {
    /// Stable content key.
    pub id: String,
    /// Icon name.
    pub icon: String,
    /// Locale the text resolved in.
    pub locale: Locale,
    /// Section title.
    pub title: String,
    /// Paragraphs.
    pub content: Vec<String>,
    /// When the editors last reviewed the advice.
    pub last_reviewed_at: DateTime<Utc>,
    /// Sources backing the advice.
    #[serde(default)]
    pub source_refs: Vec<String>,
    /// Urgency.
    #[serde(default)]
    pub safety_level: SafetyLevel,
}

/// A Darija phrase with its English and French equivalents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    /// Stable content key.
    pub id: String,
    /// Situation the phrase fits.
    pub category: PhraseCategory,
    /// Locale the gloss resolved in.
    pub locale: Locale,
    /// English equivalent.
    pub english: String,
    /// Darija in Arabic script.
    pub darija: String,
    /// Darija transliterated to Latin script.
    pub darija_latin: String,
    /// French equivalent.
    pub french: String,
    /// Recorded pronunciation bundled with the pack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    /// Meaning explained in the resolved locale.
    pub gloss: String,
}
