//! The data-access contract consumed by every screen.
//!
//! Content reads take a [`Locale`] and walk its fallback chain. A single read
//! returns the record from the first locale that has it; a collection read
//! returns the rows of the first locale whose filtered result is non-empty.
//! Results from different locales are never merged into one response.
//!
//! A missing record is `Ok(None)` (or an empty collection), never an error:
//! user data may reference content removed by a later pack.

use serde::{Deserialize, Serialize};

use crate::{
    ContentRef, DurationType, Favorite, Itinerary, Locale, Phrase, PhraseCategory, Pick,
    PickCategory, Place, PlaceFilters, SearchOptions, TipSection,
};

/// Identity of the content snapshot serving reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentVersion {
    /// Pack version string.
    pub version: String,
    /// Pack sequence number.
    pub sequence: u64,
}

/// Typed reads over travel content and favourite management.
///
/// Implementations serve every content read from one consistent snapshot per
/// call and write favourites durably before returning.
pub trait Repository {
    /// Failure raised by the backing store.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch one place by id.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn place(&self, id: &str, locale: Locale) -> Result<Option<Place>, Self::Error>;

    /// List places matching `filters`, featured first, then by rating.
    ///
    /// # Errors
    /// Returns [`Self::Error`] for invalid filters or store failures.
    fn places(&self, locale: Locale, filters: &PlaceFilters) -> Result<Vec<Place>, Self::Error>;

    /// Full-text search ranked by relevance.
    ///
    /// Only the index of the first locale in the chain that has indexed text
    /// is consulted.
    ///
    /// # Errors
    /// Returns [`Self::Error`] for invalid queries or store failures.
    fn search_places(&self, options: &SearchOptions) -> Result<Vec<Place>, Self::Error>;

    /// Fetch one itinerary by id.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn itinerary(&self, id: &str, locale: Locale) -> Result<Option<Itinerary>, Self::Error>;

    /// List itineraries, optionally of one length.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn itineraries(
        &self,
        locale: Locale,
        duration: Option<DurationType>,
    ) -> Result<Vec<Itinerary>, Self::Error>;

    /// Fetch one pick by id.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn pick(&self, id: &str, locale: Locale) -> Result<Option<Pick>, Self::Error>;

    /// List picks, optionally of one category.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn picks(
        &self,
        locale: Locale,
        category: Option<PickCategory>,
    ) -> Result<Vec<Pick>, Self::Error>;

    /// Fetch one tip section by id.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn tip_section(&self, id: &str, locale: Locale) -> Result<Option<TipSection>, Self::Error>;

    /// List every tip section.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn tip_sections(&self, locale: Locale) -> Result<Vec<TipSection>, Self::Error>;

    /// Fetch one phrase by id.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn phrase(&self, id: &str, locale: Locale) -> Result<Option<Phrase>, Self::Error>;

    /// List phrases, optionally of one category, in phrasebook order.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the store cannot be read.
    fn phrases(
        &self,
        locale: Locale,
        category: Option<PhraseCategory>,
    ) -> Result<Vec<Phrase>, Self::Error>;

    /// Every favourite, newest first.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the user database cannot be read.
    fn favorites(&self) -> Result<Vec<Favorite>, Self::Error>;

    /// Save a favourite. Saving an existing favourite succeeds unchanged.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the content kind cannot be favourited or
    /// the write fails.
    fn add_favorite(&self, content: &ContentRef) -> Result<(), Self::Error>;

    /// Remove a favourite. Removing an absent favourite succeeds.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the write fails.
    fn remove_favorite(&self, content: &ContentRef) -> Result<(), Self::Error>;

    /// Whether `content` is saved.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the user database cannot be read.
    fn is_favorite(&self, content: &ContentRef) -> Result<bool, Self::Error>;

    /// Flip the saved state and return the new one.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the write fails.
    fn toggle_favorite(&self, content: &ContentRef) -> Result<bool, Self::Error> {
        if self.is_favorite(content)? {
            self.remove_favorite(content)?;
            Ok(false)
        } else {
            self.add_favorite(content)?;
            Ok(true)
        }
    }

    /// Version of the snapshot currently serving reads, if any.
    ///
    /// # Errors
    /// Returns [`Self::Error`] when the snapshot metadata cannot be read.
    fn active_content_version(&self) -> Result<Option<ContentVersion>, Self::Error>;
}
