//! Process-wide data layer: one content store, one user database, one swap
//! manager, created together at startup and passed to whoever needs them.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::{AppVersion, Clock, SystemClock};
use log::info;
use thiserror::Error;

use crate::content::{ContentStore, ContentStoreError};
use crate::pack::{ContentSwapManager, KeyRing};
use crate::repository::SqliteRepository;
use crate::user::{UserDataError, UserDatabase};

/// File name of the user database inside the data directory.
pub const USER_DB_FILE: &str = "user.db";
/// Directory holding the content area inside the data directory.
pub const CONTENT_DIR: &str = "content";

/// Errors raised while starting the data layer.
#[derive(Debug, Error)]
pub enum DataLayerError {
    /// The content area could not be opened.
    #[error(transparent)]
    Content(#[from] ContentStoreError),
    /// The user database could not be opened or reset.
    #[error(transparent)]
    User(#[from] UserDataError),
}

/// Settings needed to open the data layer.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root of every persisted file.
    pub data_dir: Utf8PathBuf,
    /// Version of the running application.
    pub app_version: AppVersion,
    /// Keys trusted to sign content packs.
    pub keys: KeyRing,
}

impl StoreConfig {
    /// Path of the user database.
    #[must_use]
    pub fn user_db_path(&self) -> Utf8PathBuf {
        self.data_dir.join(USER_DB_FILE)
    }

    /// Root of the content area.
    #[must_use]
    pub fn content_root(&self) -> Utf8PathBuf {
        self.data_dir.join(CONTENT_DIR)
    }
}

/// The opened stores and the services built on them.
#[derive(Debug, Clone)]
pub struct DataLayer {
    repository: SqliteRepository,
    swap: Arc<ContentSwapManager>,
    user: Arc<UserDatabase>,
}

impl DataLayer {
    /// Open both databases under `config.data_dir` using wall-clock time.
    ///
    /// # Errors
    /// Returns [`DataLayerError`] when either store cannot be opened.
    pub fn init(config: StoreConfig) -> Result<Self, DataLayerError> {
        Self::init_with_clock(config, Arc::new(SystemClock))
    }

    /// Open both databases with an explicit clock.
    ///
    /// # Errors
    /// Returns [`DataLayerError`] when either store cannot be opened.
    pub fn init_with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, DataLayerError> {
        let content = Arc::new(ContentStore::open(config.content_root())?);
        let user = Arc::new(UserDatabase::open(&config.user_db_path(), Arc::clone(&clock))?);
        info!("data layer opened at {}", config.data_dir);
        let swap = Arc::new(ContentSwapManager::new(
            Arc::clone(&content),
            Arc::clone(&user),
            config.keys,
            config.app_version,
        ));
        Ok(Self {
            repository: SqliteRepository::new(content, Arc::clone(&user), clock),
            swap,
            user,
        })
    }

    /// Typed reads and favourites.
    #[must_use]
    pub const fn repository(&self) -> &SqliteRepository {
        &self.repository
    }

    /// Pack installation.
    #[must_use]
    pub fn swap_manager(&self) -> &ContentSwapManager {
        &self.swap
    }

    /// Delete every user record; content is untouched.
    ///
    /// # Errors
    /// Returns [`DataLayerError::User`] when the reset fails.
    pub fn reset_user_data(&self) -> Result<(), DataLayerError> {
        self.user.clear_all()?;
        info!("user data cleared");
        Ok(())
    }

    /// Root of the content area.
    #[must_use]
    pub fn content_root(&self) -> &Utf8Path {
        self.repository.content().layout().root()
    }
}
