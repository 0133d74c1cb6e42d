//! Query inputs accepted by the repository.
//!
//! Filters are validated before any I/O so a malformed request never reaches
//! the database.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::{Locale, PlaceCategory, PriceRange};

/// Number of search hits returned when the caller does not set a limit.
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// Errors raised for malformed query input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    /// The minimum rating was not a number between 0 and 5.
    #[error("minimum rating {value} is outside 0..=5")]
    MinRatingOutOfRange {
        /// Offending value.
        value: f64,
    },
    /// An explicit limit of zero was requested.
    #[error("limit must be greater than zero")]
    ZeroLimit,
    /// The price filter was present but named no bands.
    #[error("price range filter must name at least one band")]
    EmptyPriceRanges,
    /// The neighbourhood filter was blank.
    #[error("neighborhood filter must not be blank")]
    BlankNeighborhood,
    /// The search query was empty or whitespace.
    #[error("search query must not be empty")]
    EmptyQuery,
    /// The search query contained nothing that can be matched.
    #[error("search query '{query}' contains no searchable terms")]
    NoSearchTerms {
        /// Query as supplied.
        query: String,
    },
}

/// Optional constraints applied to place listings and searches.
///
/// All constraints combine with logical AND. Pagination applies after
/// filtering and ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceFilters {
    /// Keep only this category.
    pub category: Option<PlaceCategory>,
    /// Keep only this neighbourhood (exact match).
    pub neighborhood: Option<String>,
    /// Keep only these price bands.
    pub price_ranges: Option<BTreeSet<PriceRange>>,
    /// Keep places rated at least this.
    pub min_rating: Option<f64>,
    /// Keep only places open at query time.
    pub open_now: bool,
    /// Keep only places whose featured flag equals this.
    pub featured: Option<bool>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Results to skip before the first returned one.
    pub offset: u32,
}

impl PlaceFilters {
    /// Restrict to one category.
    #[must_use]
    pub const fn with_category(mut self, category: PlaceCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Restrict to one neighbourhood.
    #[must_use]
    pub fn with_neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }

    /// Restrict to the given price bands.
    #[must_use]
    pub fn with_price_ranges(mut self, bands: impl IntoIterator<Item = PriceRange>) -> Self {
        self.price_ranges = Some(bands.into_iter().collect());
        self
    }

    /// Require a minimum rating.
    #[must_use]
    pub const fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    /// Keep only places open when the query runs.
    #[must_use]
    pub const fn open_now(mut self) -> Self {
        self.open_now = true;
        self
    }

    /// Filter on the featured flag.
    #[must_use]
    pub const fn with_featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    /// Paginate the results.
    #[must_use]
    pub const fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Reject malformed filters.
    ///
    /// # Errors
    /// Returns the first [`FilterError`] found.
    pub fn validate(&self) -> Result<(), FilterError> {
        if let Some(value) = self.min_rating
            && !(0.0..=5.0).contains(&value)
        {
            return Err(FilterError::MinRatingOutOfRange { value });
        }
        if self.limit == Some(0) {
            return Err(FilterError::ZeroLimit);
        }
        if self.price_ranges.as_ref().is_some_and(BTreeSet::is_empty) {
            return Err(FilterError::EmptyPriceRanges);
        }
        if self
            .neighborhood
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(FilterError::BlankNeighborhood);
        }
        Ok(())
    }
}

/// Full-text search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Free text typed by the user.
    pub query: String,
    /// Requested locale; resolved through its fallback chain.
    pub locale: Locale,
    /// Extra constraints on the hits.
    pub filters: PlaceFilters,
    /// Maximum hits; [`DEFAULT_SEARCH_LIMIT`] when absent.
    pub limit: Option<u32>,
}

impl SearchOptions {
    /// Search `query` in `locale` with no extra filters.
    #[must_use]
    pub fn new(query: impl Into<String>, locale: Locale) -> Self {
        Self {
            query: query.into(),
            locale,
            filters: PlaceFilters::default(),
            limit: None,
        }
    }

    /// Constrain the hits.
    #[must_use]
    pub fn with_filters(mut self, filters: PlaceFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Cap the number of hits.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Limit that applies after defaults.
    #[must_use]
    pub const fn effective_limit(&self) -> u32 {
        match self.limit {
            Some(limit) => limit,
            None => DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Reject empty queries and malformed filters.
    ///
    /// # Errors
    /// Returns the first [`FilterError`] found.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.query.trim().is_empty() {
            return Err(FilterError::EmptyQuery);
        }
        if self.limit == Some(0) {
            return Err(FilterError::ZeroLimit);
        }
        self.filters.validate()
    }
}
