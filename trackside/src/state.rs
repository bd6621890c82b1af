use crate::catalog::TrackId;
use crate::events::{CameraMode, SessionPhase};

/// What the host last told us about the view and the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameState {
    pub viewed_entity: u8,
    /// `None` until the first state update
    pub camera: Option<CameraMode>,
    pub ui_overlay: bool,
    pub track: Option<TrackId>,
    pub phase: SessionPhase,
}

impl GameState {
    pub fn in_progress(&self) -> bool {
        self.phase == SessionPhase::InProgress
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    NoTrack,
    TrackLoaded {
        track: TrackId,
    },
}

impl PlaybackState {
    pub fn track(&self) -> Option<&TrackId> {
        match self {
            PlaybackState::NoTrack => None,
            PlaybackState::TrackLoaded { track } => Some(track),
        }
    }
}
