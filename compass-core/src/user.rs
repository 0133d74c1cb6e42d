//! Records owned by the traveller.
//!
//! User data lives in its own database and outlives every content pack. Rows
//! refer to content by `(content_type, content_id)` only; after a pack swap
//! that reference may point at nothing, which callers treat as "content
//! removed" rather than as corruption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

wire_enum! {
    /// Kind of content a user record points at.
    pub enum ContentType: "content type" {
        /// A place.
        Place => "place",
        /// An itinerary.
        Itinerary => "itinerary",
        /// An editor's pick.
        Pick => "pick",
        /// A tip section.
        Tip => "tip",
        /// A phrase.
        Phrase => "phrase",
    }
}

impl ContentType {
    /// Whether the content kind can be saved as a favourite.
    #[must_use]
    pub const fn is_favoritable(self) -> bool {
        matches!(self, Self::Place | Self::Itinerary | Self::Pick)
    }
}

/// Reference to a content record by kind and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    /// Content kind.
    pub content_type: ContentType,
    /// Content id; may dangle after a content update.
    pub content_id: String,
}

impl ContentRef {
    /// Build a reference.
    #[must_use]
    pub fn new(content_type: ContentType, content_id: impl Into<String>) -> Self {
        Self {
            content_type,
            content_id: content_id.into(),
        }
    }

    /// Reference to a place.
    #[must_use]
    pub fn place(content_id: impl Into<String>) -> Self {
        Self::new(ContentType::Place, content_id)
    }
}

/// A saved favourite. `(content_type, content_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    /// Surrogate key.
    pub id: i64,
    /// What was saved.
    #[serde(flatten)]
    pub content: ContentRef,
    /// When it was saved.
    pub created_at: DateTime<Utc>,
}

/// A free-text note attached to a content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Surrogate key.
    pub id: i64,
    /// Annotated content.
    #[serde(flatten)]
    pub content: ContentRef,
    /// Note body; absent when the user cleared it.
    pub note_text: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
}

/// One entry of the packing or to-do checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    /// Surrogate key.
    pub id: i64,
    /// Item text.
    pub title: String,
    /// Ticked off.
    pub completed: bool,
    /// Position in the list; lower sorts first.
    pub sort_order: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

wire_enum! {
    /// What is wrong with a content record.
    pub enum ReportType: "report type" {
        /// Details are wrong.
        Incorrect => "incorrect",
        /// The venue has closed.
        Closed => "closed",
        /// Details are out of date.
        Outdated => "outdated",
        /// Anything else.
        Other => "other",
    }
}

/// A problem report queued for upstream delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReport {
    /// Surrogate key.
    pub id: i64,
    /// Reported content.
    #[serde(flatten)]
    pub content: ContentRef,
    /// Problem kind.
    pub report_type: ReportType,
    /// Optional free text.
    pub details: Option<String>,
    /// When the report was filed.
    pub created_at: DateTime<Utc>,
    /// Delivered upstream.
    pub synced: bool,
}

wire_enum! {
    /// Kind of downloadable pack.
    pub enum PackType: "pack type" {
        /// Offline map tiles.
        Map => "map",
        /// Travel content.
        Content => "content",
        /// Routing graph.
        Routing => "routing",
    }
}

wire_enum! {
    /// Persisted download state of a pack.
    pub enum DownloadState: "download state" {
        /// Known but not started, or parked until the app updates.
        Pending => "pending",
        /// Transferring or being verified.
        Downloading => "downloading",
        /// Installed and usable.
        Ready => "ready",
        /// Gave up; needs a fresh download.
        Failed => "failed",
    }
}

/// Progress row for one pack download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStatus {
    /// Pack identifier; primary key.
    pub pack_id: String,
    /// Pack kind.
    pub pack_type: PackType,
    /// Coarse state.
    pub status: DownloadState,
    /// Fraction complete in `0.0..=1.0`.
    pub progress: f64,
    /// Total size when known.
    pub size_bytes: Option<u64>,
    /// Bytes received so far.
    pub downloaded_bytes: u64,
    /// Reason for the last failure or deferral.
    pub error_message: Option<String>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl DownloadStatus {
    /// A fresh `pending` row with no progress.
    #[must_use]
    pub fn pending(pack_id: impl Into<String>, pack_type: PackType, now: DateTime<Utc>) -> Self {
        Self {
            pack_id: pack_id.into(),
            pack_type,
            status: DownloadState::Pending,
            progress: 0.0,
            size_bytes: None,
            downloaded_bytes: 0,
            error_message: None,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ContentType::Place, true)]
    #[case(ContentType::Itinerary, true)]
    #[case(ContentType::Pick, true)]
    #[case(ContentType::Tip, false)]
    #[case(ContentType::Phrase, false)]
    fn only_places_itineraries_and_picks_are_favoritable(
        #[case] kind: ContentType,
        #[case] expected: bool,
    ) {
        assert_eq!(kind.is_favoritable(), expected);
    }

    #[rstest]
    fn favorite_serialises_with_flattened_reference() {
        let favorite = Favorite {
            id: 3,
            content: ContentRef::place("p1"),
            created_at: DateTime::from_timestamp(0, 0).expect("epoch"),
        };
        let json = serde_json::to_value(&favorite).expect("serialise");
        assert_eq!(json["contentType"], "place");
        assert_eq!(json["contentId"], "p1");
    }
}
