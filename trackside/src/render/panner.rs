//! Panner parameters translated into spatializer inputs.
//!
//! Steam Audio computes the distance falloff and the binaural rendering. The
//! configured reference distance, rolloff and maximum distance are expressed
//! by moving the simulated source along the listener-to-source line, and the
//! sound cone is applied as a directivity gain.

use crate::config::PannerParams;
use crate::math::{ListenerPose, Vec3};

/// Distance at which the simulator should place the source so that its
/// inverse-distance falloff (unity inside 1 m) matches the panner's
/// `ref / (ref + rolloff * (d - ref))` curve with `d` clamped to
/// `[ref, max]`.
pub fn simulated_distance(params: &PannerParams, distance: f32) -> f32 {
    let reference = params.ref_distance;
    if reference <= 0.0 {
        return 1.0;
    }
    let distance = distance.clamp(reference, params.max_distance.max(reference));
    (reference + params.rolloff_factor * (distance - reference)) / reference
}

/// Point handed to the simulator for a source heard at `listener`.
pub fn simulated_position(params: &PannerParams, listener: &ListenerPose) -> Vec3 {
    let relative = params.position - listener.position;
    let mut direction = relative.normalize_or_zero();
    if direction == Vec3::ZERO {
        direction = listener.forward.normalize_or_zero();
    }
    listener.position + direction * simulated_distance(params, relative.length())
}

/// Source direction in the listener's frame: +X right, +Y up, -Z ahead.
pub fn listener_direction(params: &PannerParams, listener: &ListenerPose) -> Vec3 {
    let relative = (params.position - listener.position).normalize_or_zero();
    if relative == Vec3::ZERO {
        return Vec3::NEG_Z;
    }
    let forward = listener.forward.normalize_or_zero();
    let up = listener.up.normalize_or_zero();
    Vec3::new(
        relative.dot(listener.right()),
        relative.dot(up),
        -relative.dot(forward),
    )
}

/// Directivity gain of a sound cone.
///
/// Angles are full cone angles in degrees. Inside half the inner angle the
/// gain is 1, beyond half the outer angle it is `outer_gain`, and it blends
/// linearly in between. A zero orientation is omnidirectional.
pub fn cone_gain(
    orientation: Vec3,
    source: Vec3,
    listener: Vec3,
    inner_angle: f32,
    outer_angle: f32,
    outer_gain: f32,
) -> f32 {
    if orientation == Vec3::ZERO || (inner_angle >= 360.0 && outer_angle >= 360.0) {
        return 1.0;
    }
    let to_listener = (listener - source).normalize_or_zero();
    if to_listener == Vec3::ZERO {
        return 1.0;
    }

    let angle = orientation
        .normalize()
        .dot(to_listener)
        .clamp(-1.0, 1.0)
        .acos()
        .to_degrees();
    let inner = inner_angle * 0.5;
    let outer = outer_angle * 0.5;

    if angle <= inner {
        1.0
    } else if angle >= outer {
        outer_gain
    } else {
        let t = (angle - inner) / (outer - inner);
        1.0 - t * (1.0 - outer_gain)
    }
}

pub fn directivity(params: &PannerParams, listener: &ListenerPose) -> f32 {
    cone_gain(
        params.orientation,
        params.position,
        listener.position,
        params.cone_inner_angle,
        params.cone_outer_angle,
        params.cone_outer_gain,
    )
}

/// Scales `samples` by a gain moving linearly from `from` to `to`, reaching
/// `to` on the last sample.
pub fn ramp_gain(samples: &mut [f32], from: f32, to: f32) {
    let n = samples.len() as f32;
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = (i + 1) as f32 / n;
        *sample *= from + (to - from) * t;
    }
}
