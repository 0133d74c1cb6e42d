//! `SQLite` implementation of [`Repository`].
//!
//! Content reads pin the active [`ContentSnapshot`] for the whole call and run
//! every fallback step on one connection, so a pack activated mid-call is
//! never observed. Favourites and the other user records go to the
//! [`UserDatabase`], which never blocks on content reads.
//!
//! [`ContentSnapshot`]: crate::content::ContentSnapshot

mod guide;
mod places;
mod resolve;
mod search;


use std::sync::Arc;

use compass_core::{
    Clock, ContentRef, ContentVersion, DurationType, Favorite, FilterError, Itinerary, Locale,
    Phrase, PhraseCategory, Pick, PickCategory, Place, PlaceFilters, Repository, SearchOptions,
    TipSection,
};
use rusqlite::Connection;
use thiserror::Error;

use crate::content::{ContentStore, SnapshotError};
use crate::user::{UserDataError, UserDatabase};

use self::guide::{ITINERARIES, PHRASES, PICKS, TIPS};
use self::places::FilterSql;
use self::resolve::{first_found, first_non_empty};

/// Errors raised by [`SqliteRepository`].
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The request was malformed and never reached the database.
    #[error(transparent)]
    InvalidInput(#[from] FilterError),
    /// No content pack has been activated yet.
    #[error("no content pack is active")]
    NoActiveContent,
    /// A content query failed.
    #[error("content query '{operation}' failed")]
    Content {
        /// What was being read.
        operation: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// The active snapshot could not be opened for reading.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// A user database operation failed.
    #[error(transparent)]
    User(#[from] UserDataError),
}

/// Repository over the active content snapshot and the user database.
#[derive(Clone)]
pub struct SqliteRepository {
    content: Arc<ContentStore>,
    user: Arc<UserDatabase>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRepository")
            .field("content", &self.content)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl SqliteRepository {
    /// Repository reading from `content` and `user`; `clock` decides what
    /// "open now" means.
    #[must_use]
    pub const fn new(content: Arc<ContentStore>, user: Arc<UserDatabase>, clock: Arc<dyn Clock>) -> Self {
        Self {
            content,
            user,
            clock,
        }
    }

    /// Notes, checklist, issue reports and download status.
    #[must_use]
    pub fn user_data(&self) -> &UserDatabase {
        &self.user
    }

    /// The content area this repository reads.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    fn read<T>(
        &self,
        operation: &'static str,
        read: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, RepositoryError> {
        let snapshot = self
            .content
            .current()
            .ok_or(RepositoryError::NoActiveContent)?;
        snapshot.with_connection(|conn| {
            read(conn).map_err(|source| RepositoryError::Content { operation, source })
        })
    }
}

impl Repository for SqliteRepository {
    type Error = RepositoryError;

    fn place(&self, id: &str, locale: Locale) -> Result<Option<Place>, Self::Error> {
        self.read("get place", |conn| {
            first_found(locale.fallback_chain(), |candidate| {
                places::find(conn, id, candidate)
            })
        })
    }

    fn places(&self, locale: Locale, filters: &PlaceFilters) -> Result<Vec<Place>, Self::Error> {
        filters.validate()?;
        let sql = FilterSql::new(filters);
        let now = self.clock.now();
        let matching = self.read("list places", |conn| {
            first_non_empty(locale.fallback_chain(), |candidate| {
                let mut found = places::list(conn, candidate, &sql)?;
                places::retain_open(&mut found, filters, now);
                Ok(found)
            })
        })?;
        Ok(places::paginate(matching, filters.offset, filters.limit))
    }

    fn search_places(&self, options: &SearchOptions) -> Result<Vec<Place>, Self::Error> {
        options.validate()?;
        let expression = search::match_expression(&options.query)?;
        let now = self.clock.now();
        let limit = options
            .filters
            .limit
            .map_or(options.effective_limit(), |cap| cap.min(options.effective_limit()));
        let hits = self.read("search places", |conn| {
            for candidate in options.locale.fallback_chain() {
                if search::has_text(conn, candidate)? {
                    let mut found = search::ranked(conn, &expression, candidate, options)?;
                    places::retain_open(&mut found, &options.filters, now);
                    return Ok(found);
                }
            }
            Ok(Vec::new())
        })?;
        Ok(places::paginate(hits, options.filters.offset, Some(limit)))
    }

    fn itinerary(&self, id: &str, locale: Locale) -> Result<Option<Itinerary>, Self::Error> {
        self.read("get itinerary", |conn| {
            first_found(locale.fallback_chain(), |candidate| {
                ITINERARIES.find(conn, id, candidate)
            })
        })
    }

    fn itineraries(
        &self,
        locale: Locale,
        duration: Option<DurationType>,
    ) -> Result<Vec<Itinerary>, Self::Error> {
        let filter = duration.map(|d| ("duration_type", d.as_str()));
        self.read("list itineraries", |conn| {
            first_non_empty(locale.fallback_chain(), |candidate| {
                ITINERARIES.list(conn, candidate, filter)
            })
        })
    }

    fn pick(&self, id: &str, locale: Locale) -> Result<Option<Pick>, Self::Error> {
        self.read("get pick", |conn| {
            first_found(locale.fallback_chain(), |candidate| {
                PICKS.find(conn, id, candidate)
            })
        })
    }

    fn picks(
        &self,
        locale: Locale,
        category: Option<PickCategory>,
    ) -> Result<Vec<Pick>, Self::Error> {
        let filter = category.map(|c| ("category", c.as_str()));
        self.read("list picks", |conn| {
            first_non_empty(locale.fallback_chain(), |candidate| {
                PICKS.list(conn, candidate, filter)
            })
        })
    }

    fn tip_section(&self, id: &str, locale: Locale) -> Result<Option<TipSection>, Self::Error> {
        self.read("get tip section", |conn| {
            first_found(locale.fallback_chain(), |candidate| {
                TIPS.find(conn, id, candidate)
            })
        })
    }

    fn tip_sections(&self, locale: Locale) -> Result<Vec<TipSection>, Self::Error> {
        self.read("list tip sections", |conn| {
            first_non_empty(locale.fallback_chain(), |candidate| {
                TIPS.list(conn, candidate, None)
            })
        })
    }

    fn phrase(&self, id: &str, locale: Locale) -> Result<Option<Phrase>, Self::Error> {
        self.read("get phrase", |conn| {
            first_found(locale.fallback_chain(), |candidate| {
                PHRASES.find(conn, id, candidate)
            })
        })
    }

    fn phrases(
        &self,
        locale: Locale,
        category: Option<PhraseCategory>,
    ) -> Result<Vec<Phrase>, Self::Error> {
        let filter = category.map(|c| ("category", c.as_str()));
        self.read("list phrases", |conn| {
            first_non_empty(locale.fallback_chain(), |candidate| {
                PHRASES.list(conn, candidate, filter)
            })
        })
    }

    fn favorites(&self) -> Result<Vec<Favorite>, Self::Error> {
        Ok(self.user.favorites()?)
    }

    fn add_favorite(&self, content: &ContentRef) -> Result<(), Self::Error> {
        Ok(self.user.add_favorite(content)?)
    }

    fn remove_favorite(&self, content: &ContentRef) -> Result<(), Self::Error> {
        Ok(self.user.remove_favorite(content)?)
    }

    fn is_favorite(&self, content: &ContentRef) -> Result<bool, Self::Error> {
        Ok(self.user.is_favorite(content)?)
    }

    fn toggle_favorite(&self, content: &ContentRef) -> Result<bool, Self::Error> {
        Ok(self.user.toggle_favorite(content)?)
    }

    fn active_content_version(&self) -> Result<Option<ContentVersion>, Self::Error> {
        Ok(self.content.active_version())
    }
}
