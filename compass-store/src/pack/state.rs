//! Per-pack install state and its persisted form.

use std::fmt;

use compass_core::{DownloadState, PackType};
use log::{debug, warn};

use crate::user::UserDatabase;

/// Where a pack is in its journey from download to activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackState {
    /// Known but not yet fetched, or parked for a later retry.
    Pending,
    /// Bytes are arriving.
    Downloading,
    /// Checksums and signature are being checked.
    Verifying,
    /// Verified and staged; activation may begin.
    Ready,
    /// Serving reads.
    Active,
    /// Rejected; needs a fresh download.
    Failed,
    /// Requires a newer application; kept for retry after an update.
    Incompatible,
}

impl PackState {
    /// Lower-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Incompatible => "incompatible",
        }
    }

    /// The coarser state recorded in `download_status`.
    #[must_use]
    pub const fn persisted(self) -> DownloadState {
        match self {
            Self::Pending | Self::Incompatible => DownloadState::Pending,
            Self::Downloading | Self::Verifying => DownloadState::Downloading,
            Self::Ready | Self::Active => DownloadState::Ready,
            Self::Failed => DownloadState::Failed,
        }
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Any state before `active` may fail or be parked as pending again
    /// (cancellation); `active` and `failed` are terminal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Downloading)
                | (Self::Downloading, Self::Verifying)
                | (Self::Verifying, Self::Ready | Self::Incompatible)
                | (Self::Ready, Self::Active)
                | (
                    Self::Pending | Self::Downloading | Self::Verifying | Self::Ready,
                    Self::Failed | Self::Pending
                )
                | (Self::Incompatible, Self::Pending | Self::Downloading)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Active | Self::Failed)
    }
}

impl fmt::Display for PackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Walks one pack through [`PackState`] and mirrors each step into the user
/// database.
///
/// A failed status write is logged and otherwise ignored: the install itself
/// must not fail because its progress could not be recorded.
pub(super) struct StateTracker<'a> {
    user: &'a UserDatabase,
    pack_id: &'a str,
    state: PackState,
}

impl<'a> StateTracker<'a> {
    pub(super) fn start(user: &'a UserDatabase, pack_id: &'a str) -> Self {
        let mut tracker = Self {
            user,
            pack_id,
            state: PackState::Pending,
        };
        tracker.advance(PackState::Downloading, None);
        tracker
    }

    pub(super) const fn state(&self) -> PackState {
        self.state
    }

    pub(super) fn advance(&mut self, next: PackState, message: Option<&str>) {
        if !self.state.can_transition_to(next) {
            warn!(
                "pack {} moved from {} to {}, which the state machine does not allow",
                self.pack_id, self.state, next
            );
        }
        debug!("pack {}: {} -> {}", self.pack_id, self.state, next);
        self.state = next;
        if let Err(err) =
            self.user
                .set_download_state(self.pack_id, PackType::Content, next.persisted(), message)
        {
            warn!("failed to record status of pack {}: {err}", self.pack_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PackState::Verifying, DownloadState::Downloading)]
    #[case(PackState::Active, DownloadState::Ready)]
    #[case(PackState::Incompatible, DownloadState::Pending)]
    #[case(PackState::Failed, DownloadState::Failed)]
    fn fine_states_collapse_onto_stored_states(
        #[case] state: PackState,
        #[case] stored: DownloadState,
    ) {
        assert_eq!(state.persisted(), stored);
    }

    #[rstest]
    #[case(PackState::Pending, PackState::Downloading, true)]
    #[case(PackState::Verifying, PackState::Incompatible, true)]
    #[case(PackState::Ready, PackState::Failed, true)]
    #[case(PackState::Ready, PackState::Active, true)]
    #[case(PackState::Downloading, PackState::Active, false)]
    #[case(PackState::Active, PackState::Failed, false)]
    #[case(PackState::Failed, PackState::Downloading, false)]
    fn only_forward_moves_are_allowed(
        #[case] from: PackState,
        #[case] to: PackState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[rstest]
    fn terminal_states_have_no_successors() {
        let all = [
            PackState::Pending,
            PackState::Downloading,
            PackState::Verifying,
            PackState::Ready,
            PackState::Active,
            PackState::Failed,
            PackState::Incompatible,
        ];
        for from in all.iter().copied().filter(|state| state.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }
}
