//! Failure kinds recovered inside the player.  None of these ever reaches a
//! surface as an error value; the core logs them and, for playback start
//! failures only, raises a transient notice.

use nowplaying_proto::protocol::{ViewEvent, ViewState};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// The resource refused to start (autoplay policy, bad format, network).
    #[error("couldn't play {song_id}: {reason}")]
    PlaybackStart { song_id: String, reason: String },

    /// A view event with no row in the transition table.
    #[error("no transition from {from:?} on {event:?}")]
    InvalidTransition { from: ViewState, event: ViewEvent },

    /// Song/album absent from the catalog, or traversal without an album.
    #[error("missing catalog data: {0}")]
    MissingCatalogData(String),

    /// Non-finite or non-positive geometry; the last good geometry is kept.
    #[error("geometry overflow: {0}")]
    GeometryOverflow(String),
}

impl PlayerError {
    /// Only playback start failures are shown to the listener.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, PlayerError::PlaybackStart { .. })
    }
}

pub type PlayerResult<T> = Result<T, PlayerError>;
