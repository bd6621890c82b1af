use crate::math::{Vec3, orientation_from_rotation_degrees, telemetry_to_render_axes};
use std::path::PathBuf;

/// Static spatial parameters of a positional sound's panner
#[derive(Debug, Clone, PartialEq)]
pub struct PannerParams {
    /// Position in rendering axes
    pub position: Vec3,
    /// Facing of the sound cone in rendering axes
    pub orientation: Vec3,
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
    /// Full inner cone angle in degrees
    pub cone_inner_angle: f32,
    /// Full outer cone angle in degrees
    pub cone_outer_angle: f32,
    pub cone_outer_gain: f32,
}

impl Default for PannerParams {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Vec3::X,
            ref_distance: 1.0,
            max_distance: 10000.0,
            rolloff_factor: 1.0,
            cone_inner_angle: 360.0,
            cone_outer_angle: 360.0,
            cone_outer_gain: 0.0,
        }
    }
}

/// One configured sound of a track.
///
/// A definition without a position is ambient and plays at constant loudness;
/// one with a position is rendered through a panner.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundDefinition {
    /// File name, relative to the sound directory
    pub file: PathBuf,
    /// Position in meters, telemetry axis order (x, y, z with z up)
    pub position: Option<Vec3>,
    pub gain: f32,
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
    pub cone_inner_angle: f32,
    pub cone_outer_angle: f32,
    pub cone_outer_gain: f32,
    /// Yaw of the sound cone in degrees
    pub rotation: f32,
}

impl SoundDefinition {
    /// Create an ambient definition with default parameters
    pub fn ambient(file: impl Into<PathBuf>, gain: f32) -> Self {
        Self {
            file: file.into(),
            position: None,
            gain,
            ..Self::default()
        }
    }

    /// Create a positional definition with default distance and cone parameters
    pub fn positional(file: impl Into<PathBuf>, position: Vec3, gain: f32) -> Self {
        Self {
            file: file.into(),
            position: Some(position),
            gain,
            ..Self::default()
        }
    }

    pub fn is_positional(&self) -> bool {
        self.position.is_some()
    }

    /// Panner parameters in rendering axes, or `None` for ambient sounds
    pub fn panner_params(&self) -> Option<PannerParams> {
        let position = self.position?;
        Some(PannerParams {
            position: telemetry_to_render_axes(position.x, position.y, position.z),
            orientation: orientation_from_rotation_degrees(self.rotation),
            ref_distance: self.ref_distance,
            max_distance: self.max_distance,
            rolloff_factor: self.rolloff_factor,
            cone_inner_angle: self.cone_inner_angle,
            cone_outer_angle: self.cone_outer_angle,
            cone_outer_gain: self.cone_outer_gain,
        })
    }

    /// Short description for log lines: `birds.mp3 [10, -20, 2]`
    pub fn describe(&self) -> String {
        match self.position {
            Some(p) => format!("{} [{}, {}, {}]", self.file.display(), p.x, p.y, p.z),
            None => self.file.display().to_string(),
        }
    }
}

impl Default for SoundDefinition {
    fn default() -> Self {
        let panner = PannerParams::default();
        Self {
            file: PathBuf::new(),
            position: None,
            gain: 1.0,
            ref_distance: panner.ref_distance,
            max_distance: panner.max_distance,
            rolloff_factor: panner.rolloff_factor,
            cone_inner_angle: panner.cone_inner_angle,
            cone_outer_angle: panner.cone_outer_angle,
            cone_outer_gain: panner.cone_outer_gain,
            rotation: 0.0,
        }
    }
}
