//! `SQLite` persistence for the Marrakech guide.
//!
//! Responsibilities:
//! - Create and check the content and user schemas.
//! - Serve typed, locale-resolved reads from the active content snapshot.
//! - Record favourites, notes, checklist items, issue reports and download
//!   status in the user database.
//! - Verify, stage and atomically activate signed content packs.
//!
//! Invariants:
//! - A content read observes exactly one snapshot.
//! - The `ACTIVE` pointer only ever names a fully built snapshot.
//! - No global mutable state; everything hangs off [`DataLayer`].
#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod content;
mod layer;
pub mod pack;
pub mod repository;
mod rows;
pub mod schema;
pub mod user;

pub use content::{ContentSnapshot, ContentStore, ContentStoreError};
pub use layer::{CONTENT_DIR, DataLayer, DataLayerError, StoreConfig, USER_DB_FILE};
pub use pack::{ContentSwapManager, InstallOutcome, KeyRing, PackSource, SwapError};
pub use repository::{RepositoryError, SqliteRepository};
pub use user::{UserDataError, UserDatabase};
