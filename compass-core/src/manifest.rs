//! Content pack manifest and application version model.
//!
//! A manifest travels next to the pack files and authenticates them. The
//! signature covers every other manifest field, serialised as canonical JSON
//! (object keys sorted, no whitespace) with `signature` removed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the content database inside every pack.
pub const CONTENT_DB_FILE: &str = "content.db";

/// Error returned when a version string is not `major.minor.patch`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{value}' is not a major.minor.patch version")]
pub struct AppVersionError {
    /// Rejected text.
    pub value: String,
}

/// Semantic version of the running application.
///
/// Only the numeric `major.minor.patch` core is understood; ordering is
/// numeric per component.
///
/// # Examples
/// ```
/// use compass_core::AppVersion;
///
/// let running: AppVersion = "1.2.0".parse().unwrap();
/// assert!(running >= "1.0.0".parse().unwrap());
/// assert!(running < "1.10.0".parse().unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppVersion {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl AppVersion {
    /// Build a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for AppVersion {
    type Err = AppVersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || AppVersionError {
            value: value.to_owned(),
        };
        let mut parts = value.split('.').map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            part.parse::<u32>().map_err(|_| malformed())
        });
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        Ok(Self::new(major?, minor?, patch?))
    }
}

impl TryFrom<String> for AppVersion {
    type Error = AppVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AppVersion> for String {
    fn from(version: AppVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Metadata that accompanies and authenticates one content pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentManifest {
    /// Human-facing pack version, e.g. `2026.06.1`.
    pub version: String,
    /// Monotonic release counter; a pack must exceed the active one.
    pub sequence: u64,
    /// Publication time.
    pub published_at: DateTime<Utc>,
    /// Oldest application version able to read the pack.
    pub min_app_version: AppVersion,
    /// Hex SHA-256 over the sorted `file:sha256` lines of `pack_checksums`.
    pub checksum: String,
    /// Base64 Ed25519 signature over [`Self::signing_payload`].
    pub signature: String,
    /// Versions this pack can be applied on top of; absent for full packs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_from: Option<Vec<String>>,
    /// Hex SHA-256 of every file in the pack, keyed by file name.
    pub pack_checksums: BTreeMap<String, String>,
    /// Position of the signing key in the application's key ring.
    pub signing_key_index: u32,
}

impl ContentManifest {
    /// Canonical bytes covered by the signature.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the manifest cannot be serialised.
    pub fn signing_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        let serde_json::Value::Object(fields) = serde_json::to_value(self)? else {
            return serde_json::to_vec(self);
        };
        let canonical: BTreeMap<String, serde_json::Value> = fields
            .into_iter()
            .filter(|(key, _)| key != "signature")
            .collect();
        serde_json::to_vec(&canonical)
    }

    /// Whether the pack patches an earlier version instead of replacing it.
    #[must_use]
    pub const fn is_delta(&self) -> bool {
        self.delta_from.is_some()
    }

    /// Whether a delta pack may be applied on top of `active_version`.
    ///
    /// Full packs apply to anything.
    #[must_use]
    pub fn applies_to(&self, active_version: &str) -> bool {
        self.delta_from
            .as_ref()
            .is_none_or(|versions| versions.iter().any(|v| v == active_version))
    }

    /// Whether `running` satisfies the minimum application version.
    #[must_use]
    pub fn is_compatible_with(&self, running: AppVersion) -> bool {
        self.min_app_version <= running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn manifest() -> ContentManifest {
        ContentManifest {
            version: "2026.06.1".into(),
            sequence: 5,
            published_at: "2026-06-01T08:00:00Z".parse().expect("timestamp"),
            min_app_version: AppVersion::new(1, 0, 0),
            checksum: "00".into(),
            signature: "c2lnbmF0dXJl".into(),
            delta_from: None,
            pack_checksums: BTreeMap::from([(CONTENT_DB_FILE.to_owned(), "ab".to_owned())]),
            signing_key_index: 0,
        }
    }

    #[rstest]
    #[case("1.2.0", Some(AppVersion::new(1, 2, 0)))]
    #[case("10.0.3", Some(AppVersion::new(10, 0, 3)))]
    #[case("1.2", None)]
    #[case("1.2.0.4", None)]
    #[case("1.-2.0", None)]
    #[case("v1.2.0", None)]
    #[case("", None)]
    fn parses_app_versions(#[case] text: &str, #[case] expected: Option<AppVersion>) {
        assert_eq!(text.parse::<AppVersion>().ok(), expected);
    }

    #[rstest]
    fn versions_compare_numerically() {
        assert!(AppVersion::new(1, 10, 0) > AppVersion::new(1, 9, 9));
    }

    #[rstest]
    fn payload_excludes_signature_and_sorts_keys(manifest: ContentManifest) {
        let payload = String::from_utf8(manifest.signing_payload().expect("payload"))
            .expect("utf-8 payload");
        assert!(!payload.contains("signature\""));
        assert!(payload.starts_with("{\"checksum\""));
        assert!(payload.contains("\"minAppVersion\":\"1.0.0\""));
    }

    #[rstest]
    fn payload_ignores_signature_changes(manifest: ContentManifest) {
        let mut resigned = manifest.clone();
        resigned.signature = "b3RoZXI=".into();
        assert_eq!(
            manifest.signing_payload().expect("payload"),
            resigned.signing_payload().expect("payload")
        );
    }

    #[rstest]
    fn full_packs_apply_anywhere(manifest: ContentManifest) {
        assert!(!manifest.is_delta());
        assert!(manifest.applies_to("anything"));
    }

    #[rstest]
    fn deltas_apply_only_to_listed_versions(mut manifest: ContentManifest) {
        manifest.delta_from = Some(vec!["2026.05.2".into()]);
        assert!(manifest.applies_to("2026.05.2"));
        assert!(!manifest.applies_to("2026.04.1"));
    }

    #[rstest]
    #[case(AppVersion::new(1, 2, 0), true)]
    #[case(AppVersion::new(1, 0, 0), true)]
    #[case(AppVersion::new(0, 9, 9), false)]
    fn compatibility_uses_min_app_version(
        manifest: ContentManifest,
        #[case] running: AppVersion,
        #[case] compatible: bool,
    ) {
        assert_eq!(manifest.is_compatible_with(running), compatible);
    }
}
