//! Math types and telemetry unit conversions
//!
//! Telemetry reports lengths as fixed-point integers (65536 units per meter)
//! and headings as fixed-point angles (65536 units per full turn). Its
//! vertical axis is Z. The rendering space is right-handed with Y up and the
//! listener facing -Z by default.

pub use glam::Vec3;

use std::f32::consts::PI;

/// Telemetry length units per meter.
pub const LFS_UNITS_PER_METER: f32 = 65536.0;

/// Telemetry heading units per full turn.
pub const HEADING_UNITS_PER_TURN: f32 = 65536.0;

/// Converts a fixed-point telemetry length to meters.
pub fn lfs_to_meters(value: i32) -> f32 {
    value as f32 / LFS_UNITS_PER_METER
}

/// Converts a telemetry heading to a unit forward vector in rendering space.
///
/// Heading 0 faces -Z; a quarter turn (16384) faces +X.
pub fn heading_to_forward_vector(heading: u16) -> Vec3 {
    let radians = heading as f32 / HEADING_UNITS_PER_TURN * 2.0 * PI;
    Vec3::new(radians.sin(), 0.0, -radians.cos())
}

/// Converts a sound's configured yaw rotation (degrees) into the facing
/// vector of its panner. 0° faces the default listener.
pub fn orientation_from_rotation_degrees(degrees: f32) -> Vec3 {
    let radians = (degrees - 90.0) * (PI / 180.0);
    Vec3::new(radians.cos(), 0.0, radians.sin())
}

/// Reorders telemetry axes (X, Y, Z) into rendering axes (X, Z, Y).
pub fn telemetry_to_render_axes(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(x, z, y)
}

/// Listener position and orientation in rendering space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerPose {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl ListenerPose {
    pub fn new(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        Self {
            position,
            forward,
            up,
        }
    }

    /// Origin, facing -Z, Y up.
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }

    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize_or_zero()
    }
}

impl Default for ListenerPose {
    fn default() -> Self {
        Self::identity()
    }
}
