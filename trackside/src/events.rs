//! Events consumed by the playback state machine.

use crate::audio_data::DecodedBuffer;
use crate::config::SoundDefinition;
use crate::error::{SoundLoadError, TransportError};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Camera view reported by the simulation host.
///
/// Deserializes from the snake_case name (`"tv_camera"`) or the host's numeric
/// view identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "CameraField")]
pub enum CameraMode {
    Follow,
    Heli,
    TvCamera,
    Driver,
    Custom,
    Another,
}

impl CameraMode {
    /// Maps the host's numeric view identifier.
    pub fn from_view_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(CameraMode::Follow),
            1 => Some(CameraMode::Heli),
            2 => Some(CameraMode::TvCamera),
            3 => Some(CameraMode::Driver),
            4 => Some(CameraMode::Custom),
            255 => Some(CameraMode::Another),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "follow" => Some(CameraMode::Follow),
            "heli" => Some(CameraMode::Heli),
            "tv_camera" => Some(CameraMode::TvCamera),
            "driver" => Some(CameraMode::Driver),
            "custom" => Some(CameraMode::Custom),
            "another" => Some(CameraMode::Another),
            _ => None,
        }
    }

    /// Driver and custom views put the listener inside the car.
    pub fn is_in_vehicle(self) -> bool {
        matches!(self, CameraMode::Driver | CameraMode::Custom)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CameraField {
    ViewId(u8),
    Name(String),
}

impl TryFrom<CameraField> for CameraMode {
    type Error = String;

    fn try_from(field: CameraField) -> std::result::Result<Self, Self::Error> {
        match field {
            CameraField::ViewId(id) => {
                CameraMode::from_view_id(id).ok_or_else(|| format!("unknown view id {}", id))
            }
            CameraField::Name(name) => {
                CameraMode::from_name(&name).ok_or_else(|| format!("unknown camera {:?}", name))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    NoSession,
    InProgress,
}

/// Periodic snapshot of the host's view and session state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateUpdate {
    pub viewed_entity: u8,
    pub camera: CameraMode,
    /// Track code, `None` when no track is loaded on the host
    #[serde(default)]
    pub track: Option<String>,
    pub phase: SessionPhase,
    /// Whether the host has a UI overlay shown over the 3D view
    #[serde(default)]
    pub ui_overlay: bool,
}

/// Position and heading of one car in fixed-point telemetry units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EntityTelemetry {
    pub entity_id: u8,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub heading: u16,
}

/// Outcome of a background decode for one sound of a track.
#[derive(Clone)]
pub struct LoadCompletion {
    /// Load generation the job was dispatched in
    pub generation: u64,
    /// Index of the definition in the track's catalog lookup
    pub index: usize,
    pub definition: SoundDefinition,
    pub result: Result<Arc<DecodedBuffer>, SoundLoadError>,
}

impl fmt::Debug for LoadCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCompletion")
            .field("generation", &self.generation)
            .field("index", &self.index)
            .field("file", &self.definition.file)
            .field("ok", &self.result.is_ok())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    StateChanged(StateUpdate),
    SessionStarted,
    SessionEnded,
    Telemetry(Vec<EntityTelemetry>),
    SoundLoaded(LoadCompletion),
    TransportLost(TransportError),
    Shutdown,
}
