//! Pack integrity and authenticity checks.
//!
//! A pack is trusted only when every file matches `packChecksums`, the
//! manifest checksum matches those entries, and the manifest signature
//! verifies against the key the manifest names.

use std::collections::BTreeMap;
use std::io;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use compass_core::{CONTENT_DB_FILE, ContentManifest};
use ed25519_dalek::{Signature, SignatureError, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::content::is_safe_component;

/// Errors raised while verifying a pack.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The manifest does not list the content database.
    #[error("pack does not list {CONTENT_DB_FILE}")]
    MissingContentDb,
    /// A listed file name could escape the pack directory.
    #[error("pack file name '{file}' is not a plain file name")]
    UnsafeFileName {
        /// Offending name.
        file: String,
    },
    /// A listed file could not be read.
    #[error("failed to read pack file {path}")]
    Read {
        /// File path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A file's digest differs from the manifest.
    #[error("checksum mismatch for {file}: expected {expected}, found {actual}")]
    FileChecksum {
        /// File name.
        file: String,
        /// Digest listed in the manifest.
        expected: String,
        /// Digest of the bytes on disk.
        actual: String,
    },
    /// The manifest checksum does not cover its own file list.
    #[error("manifest checksum mismatch: expected {expected}, computed {actual}")]
    ManifestChecksum {
        /// Checksum in the manifest.
        expected: String,
        /// Checksum over `packChecksums`.
        actual: String,
    },
    /// The manifest names a key the ring does not hold.
    #[error("signing key {index} is not in the key ring")]
    UnknownSigningKey {
        /// Requested index.
        index: u32,
    },
    /// The signature is not valid base64.
    #[error("manifest signature is not valid base64")]
    SignatureEncoding(#[source] base64::DecodeError),
    /// The signature is malformed or does not verify.
    #[error("manifest signature is invalid")]
    Signature(#[source] SignatureError),
    /// The manifest could not be serialised for verification.
    #[error("failed to serialise manifest for verification")]
    Payload(#[source] serde_json::Error),
}

/// Errors raised while loading a key ring.
#[derive(Debug, Error)]
pub enum KeyRingError {
    /// A line is not 64 hex digits.
    #[error("key ring line {line} is not a hex-encoded 32-byte key")]
    Encoding {
        /// One-based line number.
        line: usize,
    },
    /// A line decodes to bytes that are not a valid public key.
    #[error("key ring line {line} is not a valid Ed25519 public key")]
    Key {
        /// One-based line number.
        line: usize,
        /// Underlying error.
        #[source]
        source: SignatureError,
    },
}

/// Ordered Ed25519 public keys, addressed by `signingKeyIndex`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRing {
    keys: Vec<VerifyingKey>,
}

impl KeyRing {
    /// Ring holding `keys` in index order.
    #[must_use]
    pub const fn new(keys: Vec<VerifyingKey>) -> Self {
        Self { keys }
    }

    /// Parse one hex-encoded key per line. Blank lines and lines starting
    /// with `#` are skipped but still count towards line numbers.
    ///
    /// # Errors
    /// Returns [`KeyRingError`] naming the first malformed line.
    ///
    /// # Examples
    /// ```
    /// use compass_store::pack::KeyRing;
    ///
    /// let ring = KeyRing::from_hex_lines(
    ///     "# release key\n\
    ///      d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a\n",
    /// )
    /// .expect("valid key ring");
    /// assert_eq!(ring.len(), 1);
    /// ```
    pub fn from_hex_lines(text: &str) -> Result<Self, KeyRingError> {
        let mut keys = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let bytes: [u8; 32] = hex::decode(trimmed)
                .ok()
                .and_then(|bytes| bytes.try_into().ok())
                .ok_or(KeyRingError::Encoding { line })?;
            let key = VerifyingKey::from_bytes(&bytes)
                .map_err(|source| KeyRingError::Key { line, source })?;
            keys.push(key);
        }
        Ok(Self { keys })
    }

    /// Key at `index`, if present.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&VerifyingKey> {
        usize::try_from(index).ok().and_then(|i| self.keys.get(i))
    }

    /// Number of keys.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the ring holds no keys; every pack fails verification then.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Hex SHA-256 of a file's bytes.
///
/// # Errors
/// Propagates I/O failures.
pub fn file_sha256(path: &Utf8Path) -> io::Result<String> {
    let mut file = compass_fs::open_file(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Checksum binding a manifest to its file list: SHA-256 over
/// `"<file>:<sha256>\n"` lines in file-name order.
#[must_use]
pub fn manifest_checksum(pack_checksums: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (file, digest) in pack_checksums {
        hasher.update(file.as_bytes());
        hasher.update(b":");
        hasher.update(digest.to_ascii_lowercase().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Verify every file in `dir` against `manifest`, then the manifest
/// signature against `keys`.
///
/// # Errors
/// Returns the first [`VerifyError`] found; files are checked before the
/// signature.
pub fn verify_pack(manifest: &ContentManifest, dir: &Utf8Path, keys: &KeyRing) -> Result<(), VerifyError> {
    if !manifest.pack_checksums.contains_key(CONTENT_DB_FILE) {
        return Err(VerifyError::MissingContentDb);
    }
    for (file, expected) in &manifest.pack_checksums {
        if !is_safe_component(file) {
            return Err(VerifyError::UnsafeFileName { file: file.clone() });
        }
        let path = dir.join(file);
        let actual = file_sha256(&path).map_err(|source| VerifyError::Read { path, source })?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(VerifyError::FileChecksum {
                file: file.clone(),
                expected: expected.clone(),
                actual,
            });
        }
    }

    let actual = manifest_checksum(&manifest.pack_checksums);
    if !actual.eq_ignore_ascii_case(&manifest.checksum) {
        return Err(VerifyError::ManifestChecksum {
            expected: manifest.checksum.clone(),
            actual,
        });
    }

    verify_signature(manifest, keys)
}

fn verify_signature(manifest: &ContentManifest, keys: &KeyRing) -> Result<(), VerifyError> {
    let key = keys
        .get(manifest.signing_key_index)
        .ok_or(VerifyError::UnknownSigningKey {
            index: manifest.signing_key_index,
        })?;
    let bytes = STANDARD
        .decode(manifest.signature.trim())
        .map_err(VerifyError::SignatureEncoding)?;
    let signature = Signature::from_slice(&bytes).map_err(VerifyError::Signature)?;
    let payload = manifest.signing_payload().map_err(VerifyError::Payload)?;
    key.verify_strict(&payload, &signature)
        .map_err(VerifyError::Signature)
}
