//! Assemble a snapshot directory in staging from a verified pack.

use camino::{Utf8Path, Utf8PathBuf};
use compass_core::{CONTENT_DB_FILE, ContentManifest};
use log::{debug, info, warn};
use rusqlite::Connection;

use super::delta::{apply_delta, build, reference_problems};
use super::{MANIFEST_FILE, PackSource, SwapError};
use crate::content::{ContentLayout, ContentSnapshot};
use crate::rows::format_timestamp;
use crate::schema::{
    META_PUBLISHED_AT, META_SEQUENCE, META_VERSION, initialise_content_schema,
    rebuild_search_index, write_meta,
};

/// Build the snapshot for `source` under the staging root.
///
/// Full packs are copied as listed in the manifest. Delta packs start from a
/// copy of `active` and patch its database. Either way the result carries the
/// manifest's version metadata, a rebuilt search index and consistent
/// references. The staging directory is removed when any step fails.
pub(super) fn build_staging(
    layout: &ContentLayout,
    source: &PackSource,
    active: Option<&ContentSnapshot>,
) -> Result<Utf8PathBuf, SwapError> {
    let staging = layout.staging_dir(&source.pack_id);
    let built = prepare(&staging).and_then(|()| populate(&staging, source, active));
    if let Err(err) = built {
        discard(&staging);
        return Err(err);
    }
    Ok(staging)
}

/// Best-effort removal of a staging directory.
pub(super) fn discard(staging: &Utf8Path) {
    if let Err(err) = compass_fs::remove_dir_all_if_exists(staging) {
        warn!("failed to remove staging directory {staging}: {err}");
    }
}

fn prepare(staging: &Utf8Path) -> Result<(), SwapError> {
    compass_fs::remove_dir_all_if_exists(staging)
        .and_then(|()| compass_fs::ensure_dir(staging))
        .map_err(|source| SwapError::Io {
            operation: "prepare staging directory",
            path: staging.to_owned(),
            source,
        })
}

fn populate(
    staging: &Utf8Path,
    source: &PackSource,
    active: Option<&ContentSnapshot>,
) -> Result<(), SwapError> {
    let manifest = &source.manifest;
    let db_path = staging.join(CONTENT_DB_FILE);
    match (manifest.is_delta(), active) {
        (true, Some(active)) => {
            copy_files(active.dir(), staging, files_in(active.dir())?)?;
            let extras = manifest
                .pack_checksums
                .keys()
                .filter(|name| name.as_str() != CONTENT_DB_FILE)
                .cloned();
            copy_files(&source.dir, staging, extras)?;
            let mut conn = open_rw(&db_path)?;
            let summary = apply_delta(&mut conn, source.dir.join(CONTENT_DB_FILE).as_str())?;
            info!(
                "applied delta {} onto {}: {} rows upserted, {} removed",
                manifest.version,
                active.version().version,
                summary.upserted,
                summary.removed
            );
            finish(conn, manifest)?;
        }
        (true, None) => {
            return Err(SwapError::DeltaMismatch {
                active: None,
                accepted: manifest.delta_from.clone().unwrap_or_default(),
            });
        }
        (false, _) => {
            copy_files(&source.dir, staging, manifest.pack_checksums.keys().cloned())?;
            finish(open_rw(&db_path)?, manifest)?;
        }
    }
    write_manifest(staging, manifest)
}

fn files_in(dir: &Utf8Path) -> Result<Vec<String>, SwapError> {
    compass_fs::list_dir_names(dir)
        .map(|names| {
            names
                .into_iter()
                .filter(|name| name != MANIFEST_FILE)
                .collect()
        })
        .map_err(|source| SwapError::Io {
            operation: "list snapshot files",
            path: dir.to_owned(),
            source,
        })
}

fn copy_files(
    from: &Utf8Path,
    to: &Utf8Path,
    names: impl IntoIterator<Item = String>,
) -> Result<(), SwapError> {
    for name in names {
        let source_path = from.join(&name);
        compass_fs::copy_file(&source_path, &to.join(&name)).map_err(|source| SwapError::Io {
            operation: "copy pack file",
            path: source_path.clone(),
            source,
        })?;
        debug!("staged {name}");
    }
    Ok(())
}

fn open_rw(path: &Utf8Path) -> Result<Connection, SwapError> {
    Connection::open(path).map_err(build("open staged content database"))
}

/// Stamp the manifest's metadata, rebuild the index and check references.
fn finish(mut conn: Connection, manifest: &ContentManifest) -> Result<(), SwapError> {
    initialise_content_schema(&mut conn)?;
    write_meta(&conn, META_VERSION, &manifest.version).map_err(build("write version"))?;
    write_meta(&conn, META_SEQUENCE, &manifest.sequence.to_string())
        .map_err(build("write sequence"))?;
    write_meta(
        &conn,
        META_PUBLISHED_AT,
        &format_timestamp(manifest.published_at),
    )
    .map_err(build("write publication time"))?;
    conn.execute("DELETE FROM pack_tombstones", [])
        .map_err(build("clear tombstones"))?;
    rebuild_search_index(&conn)?;

    let problems = reference_problems(&conn)?;
    if !problems.is_empty() {
        return Err(SwapError::InvalidContent { problems });
    }
    conn.close().map_err(|(_, source)| SwapError::Build {
        operation: "close staged content database",
        source,
    })
}

fn write_manifest(staging: &Utf8Path, manifest: &ContentManifest) -> Result<(), SwapError> {
    let path = staging.join(MANIFEST_FILE);
    let bytes = serde_json::to_vec_pretty(manifest).map_err(|source| SwapError::Manifest {
        path: path.clone(),
        source,
    })?;
    compass_fs::write_file_atomically(&path, &bytes).map_err(|source| SwapError::Io {
        operation: "write snapshot manifest",
        path,
        source,
    })
}
