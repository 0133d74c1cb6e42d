//! Publishing side of content packs: write a content database from typed
//! records, then checksum and sign the pack directory.
//!
//! The CLI and the tests build packs with these helpers; the app itself only
//! ever reads them.

use std::collections::{BTreeMap, HashMap};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use compass_core::{
    AppVersion, ContentManifest, ContentRef, Itinerary, Phrase, Pick, PlaceBase, PlaceI18n,
    TipSection,
};
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rusqlite::{Connection, Transaction, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MANIFEST_FILE;
use super::verify::{file_sha256, manifest_checksum};
use crate::rows::{format_timestamp, to_json};
use crate::schema::{
    META_PUBLISHED_AT, META_SEQUENCE, META_VERSION, SchemaError, initialise_content_schema,
    rebuild_search_index, write_meta,
};

/// Errors raised while writing or sealing a pack.
#[derive(Debug, Error)]
pub enum PackWriteError {
    /// The target database already exists.
    #[error("refusing to overwrite existing content database {path}")]
    Exists {
        /// Database path.
        path: Utf8PathBuf,
    },
    /// A filesystem operation failed.
    #[error("failed to {operation} at {path}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// Path involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The content schema could not be created or indexed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A row could not be written.
    #[error("failed to write {what}")]
    Write {
        /// Which rows were being written.
        what: &'static str,
        /// Underlying `SQLite` error.
        #[source]
        source: rusqlite::Error,
    },
    /// The manifest could not be serialised.
    #[error("failed to serialise the pack manifest")]
    Manifest(#[source] serde_json::Error),
}

/// Every record a pack carries.
///
/// Localised entities appear once per locale; their shared fields are taken
/// from the last occurrence of each id. Phrasebook order is the order in
/// which phrase ids first appear. Publishers keep bundles as JSON with
/// camel-case keys; missing collections are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentBundle {
    /// Language-neutral place rows.
    pub places: Vec<PlaceBase>,
    /// Localised place text.
    pub place_texts: Vec<PlaceI18n>,
    /// Itineraries, one per locale.
    pub itineraries: Vec<Itinerary>,
    /// Editor's picks, one per locale.
    pub picks: Vec<Pick>,
    /// Tip sections, one per locale.
    pub tips: Vec<TipSection>,
    /// Phrasebook entries, one per locale.
    pub phrases: Vec<Phrase>,
    /// Records a delta pack removes.
    pub tombstones: Vec<ContentRef>,
}

/// Manifest fields chosen by the publisher; the rest are computed when the
/// pack is sealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackDraft {
    /// Pack version string.
    pub version: String,
    /// Monotonic sequence number.
    pub sequence: u64,
    /// Publication time.
    pub published_at: DateTime<Utc>,
    /// Oldest app able to read the pack.
    pub min_app_version: AppVersion,
    /// Versions a delta applies to; `None` for a full pack.
    pub delta_from: Option<Vec<String>>,
}

/// Ed25519 key that signs manifests, with its position in the app key ring.
pub struct PackSigner {
    key: SigningKey,
    index: u32,
}

impl std::fmt::Debug for PackSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackSigner")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl PackSigner {
    /// Signer from a 32-byte secret key.
    #[must_use]
    pub fn from_bytes(secret: &[u8; 32], index: u32) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
            index,
        }
    }

    /// Public half, for the app key ring.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Fill `manifest.signature` and `manifest.signing_key_index`.
    ///
    /// # Errors
    /// Returns [`PackWriteError::Manifest`] when the payload cannot be built.
    pub fn sign(&self, manifest: &mut ContentManifest) -> Result<(), PackWriteError> {
        manifest.signing_key_index = self.index;
        let payload = manifest.signing_payload().map_err(PackWriteError::Manifest)?;
        manifest.signature = STANDARD.encode(self.key.sign(&payload).to_bytes());
        Ok(())
    }
}

/// Write `bundle` to a new content database at `path`.
///
/// The file carries the draft's version metadata and a rebuilt, verified
/// search index.
///
/// # Errors
/// Returns [`PackWriteError`] when the file exists or any step fails.
pub fn write_content_database(
    path: &Utf8Path,
    draft: &PackDraft,
    bundle: &ContentBundle,
) -> Result<(), PackWriteError> {
    let io = |operation: &'static str, source: std::io::Error| PackWriteError::Io {
        operation,
        path: path.to_owned(),
        source,
    };
    if compass_fs::is_file(path).map_err(|source| io("inspect database", source))? {
        return Err(PackWriteError::Exists {
            path: path.to_owned(),
        });
    }
    compass_fs::ensure_parent_dir(path).map_err(|source| io("create pack directory", source))?;
    let mut connection = Connection::open(path).map_err(|source| PackWriteError::Write {
        what: "new content database",
        source,
    })?;
    initialise_content_schema(&mut connection)?;

    let write = |what: &'static str| move |source: rusqlite::Error| PackWriteError::Write { what, source };
    let transaction = connection.transaction().map_err(write("transaction"))?;
    insert_places(&transaction, bundle).map_err(write("places"))?;
    insert_guides(&transaction, bundle).map_err(write("guide content"))?;
    insert_tombstones(&transaction, &bundle.tombstones).map_err(write("tombstones"))?;
    write_meta(&transaction, META_VERSION, &draft.version).map_err(write("metadata"))?;
    write_meta(&transaction, META_SEQUENCE, &draft.sequence.to_string())
        .map_err(write("metadata"))?;
    write_meta(
        &transaction,
        META_PUBLISHED_AT,
        &format_timestamp(draft.published_at),
    )
    .map_err(write("metadata"))?;
    transaction.commit().map_err(write("transaction"))?;

    rebuild_search_index(&connection)?;
    Ok(())
}

fn insert_places(tx: &Transaction<'_>, bundle: &ContentBundle) -> rusqlite::Result<()> {
    let mut base = tx.prepare_cached(
        "INSERT OR REPLACE INTO places_base (id, slug, category, lat, lng, neighborhood,
            price_range, rating, images, opening_hours, contacts, featured, status,
            last_verified_at, accessibility_tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )?;
    for place in &bundle.places {
        base.execute(params![
            place.id,
            place.slug,
            place.category.as_str(),
            place.coordinates.y,
            place.coordinates.x,
            place.neighborhood,
            place.price_range.map(i64::from),
            place.rating,
            to_json(&place.images)?,
            place.opening_hours.as_ref().map(to_json).transpose()?,
            place.contacts.as_ref().map(to_json).transpose()?,
            place.featured,
            place.status.as_str(),
            place.last_verified_at.map(format_timestamp),
            to_json(&place.accessibility_tags)?,
        ])?;
    }

    let mut text = tx.prepare_cached(
        "INSERT OR REPLACE INTO places_i18n (place_id, locale, name, description, tips,
            search_keywords)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for row in &bundle.place_texts {
        text.execute(params![
            row.place_id,
            row.locale.as_str(),
            row.name,
            row.description,
            to_json(&row.tips)?,
            to_json(&row.search_keywords)?,
        ])?;
    }
    Ok(())
}

fn insert_guides(tx: &Transaction<'_>, bundle: &ContentBundle) -> rusqlite::Result<()> {
    for itinerary in &bundle.itineraries {
        tx.execute(
            "INSERT OR REPLACE INTO itineraries (id, duration_type) VALUES (?1, ?2)",
            params![itinerary.id, itinerary.duration_type.as_str()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO itineraries_i18n (itinerary_id, locale, title, description, days)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                itinerary.id,
                itinerary.locale.as_str(),
                itinerary.title,
                itinerary.description,
                to_json(&itinerary.days)?,
            ],
        )?;
    }
    for pick in &bundle.picks {
        tx.execute(
            "INSERT OR REPLACE INTO picks (id, category, place_id, images) VALUES (?1, ?2, ?3, ?4)",
            params![pick.id, pick.category.as_str(), pick.place_id, to_json(&pick.images)?],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO picks_i18n (pick_id, locale, title, tagline, why_we_love_it)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pick.id,
                pick.locale.as_str(),
                pick.title,
                pick.tagline,
                pick.why_we_love_it,
            ],
        )?;
    }
    for tip in &bundle.tips {
        tx.execute(
            "INSERT OR REPLACE INTO tips (id, icon, last_reviewed_at, safety_level, source_refs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tip.id,
                tip.icon,
                format_timestamp(tip.last_reviewed_at),
                tip.safety_level.as_str(),
                to_json(&tip.source_refs)?,
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO tips_i18n (tip_id, locale, title, content) VALUES (?1, ?2, ?3, ?4)",
            params![tip.id, tip.locale.as_str(), tip.title, to_json(&tip.content)?],
        )?;
    }
    insert_phrases(tx, &bundle.phrases)
}

fn insert_phrases(tx: &Transaction<'_>, phrases: &[Phrase]) -> rusqlite::Result<()> {
    let mut order: HashMap<&str, i64> = HashMap::new();
    for phrase in phrases {
        let next = i64::try_from(order.len()).unwrap_or(i64::MAX);
        let sort_order = *order.entry(phrase.id.as_str()).or_insert(next);
        tx.execute(
            "INSERT OR REPLACE INTO phrases (id, category, english, darija, darija_latin, french,
                audio_path, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                phrase.id,
                phrase.category.as_str(),
                phrase.english,
                phrase.darija,
                phrase.darija_latin,
                phrase.french,
                phrase.audio_path,
                sort_order,
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO phrases_i18n (phrase_id, locale, gloss) VALUES (?1, ?2, ?3)",
            params![phrase.id, phrase.locale.as_str(), phrase.gloss],
        )?;
    }
    Ok(())
}

fn insert_tombstones(tx: &Transaction<'_>, tombstones: &[ContentRef]) -> rusqlite::Result<()> {
    let mut stmt =
        tx.prepare_cached("INSERT OR IGNORE INTO pack_tombstones (entity, id) VALUES (?1, ?2)")?;
    for tombstone in tombstones {
        stmt.execute(params![
            tombstone.content_type.as_str(),
            tombstone.content_id
        ])?;
    }
    Ok(())
}

/// Checksum every file in `dir`, sign the result and write `manifest.json`.
///
/// Any previous manifest in `dir` is replaced and excluded from the
/// checksums.
///
/// # Errors
/// Returns [`PackWriteError`] when a file cannot be read or the manifest
/// cannot be written.
pub fn seal_pack(
    dir: &Utf8Path,
    draft: &PackDraft,
    signer: &PackSigner,
) -> Result<ContentManifest, PackWriteError> {
    let io = |operation: &'static str, path: Utf8PathBuf| {
        move |source: std::io::Error| PackWriteError::Io {
            operation,
            path,
            source,
        }
    };
    let names = compass_fs::list_dir_names(dir).map_err(io("list pack directory", dir.to_owned()))?;
    let mut pack_checksums = BTreeMap::new();
    for name in names.into_iter().filter(|name| name != MANIFEST_FILE) {
        let path = dir.join(&name);
        let digest = file_sha256(&path).map_err(io("checksum pack file", path.clone()))?;
        pack_checksums.insert(name, digest);
    }

    let mut manifest = ContentManifest {
        version: draft.version.clone(),
        sequence: draft.sequence,
        published_at: draft.published_at,
        min_app_version: draft.min_app_version,
        checksum: manifest_checksum(&pack_checksums),
        signature: String::new(),
        delta_from: draft.delta_from.clone(),
        pack_checksums,
        signing_key_index: 0,
    };
    signer.sign(&mut manifest)?;

    let path = dir.join(MANIFEST_FILE);
    let bytes = serde_json::to_vec_pretty(&manifest).map_err(PackWriteError::Manifest)?;
    compass_fs::write_file_atomically(&path, &bytes)
        .map_err(io("write pack manifest", path.clone()))?;
    Ok(manifest)
}
