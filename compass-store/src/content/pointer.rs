use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use super::ContentStoreError;

/// Contents of the `ACTIVE` pointer file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePointer {
    /// Pack version of the active snapshot.
    pub version: String,
    /// Pack sequence of the active snapshot.
    pub sequence: u64,
    /// Snapshot directory name under `snapshots/`.
    pub dir: String,
}

impl ActivePointer {
    pub(crate) fn read(path: &Utf8Path) -> Result<Option<Self>, ContentStoreError> {
        let Some(text) =
            compass_fs::read_optional_string(path).map_err(|source| ContentStoreError::Io {
                operation: "read active pointer",
                path: path.to_owned(),
                source,
            })?
        else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| ContentStoreError::Pointer {
                path: path.to_owned(),
                source,
            })
    }

    /// Replace the pointer so a crash leaves either the old or the new one.
    pub(crate) fn write(&self, path: &Utf8Path) -> Result<(), ContentStoreError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| ContentStoreError::Pointer {
            path: path.to_owned(),
            source,
        })?;
        compass_fs::write_file_atomically(path, &bytes).map_err(|source| ContentStoreError::Io {
            operation: "write active pointer",
            path: path.to_owned(),
            source,
        })
    }
}
