//! Facade crate for the Marrakech Compass offline data layer.
//!
//! This crate re-exports the core domain types and exposes the `SQLite`
//! stores and content pack installer behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use compass_core::{
    AppVersion, ChecklistItem, Clock, ContentManifest, ContentRef, ContentType, ContentVersion,
    DownloadState, DownloadStatus, Favorite, FilterError, IssueReport, Itinerary, Locale,
    LocaleChain, Note, Phrase, Pick, Place, PlaceFilters, Repository, SearchOptions, TipSection,
    fallback_chain,
};

#[cfg(feature = "store-sqlite")]
pub use compass_store::{
    ContentSwapManager, DataLayer, DataLayerError, InstallOutcome, KeyRing, PackSource,
    RepositoryError, SqliteRepository, StoreConfig, SwapError, UserDataError, UserDatabase,
};
