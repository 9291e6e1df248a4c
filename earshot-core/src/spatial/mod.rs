//! Positional audio: where a sound sits relative to the listener.
//!
//! A position is reduced to two numbers the backend understands: a bearing in
//! degrees around the listener and a distance attenuation from 0 (at the
//! listener) to 255 (at or beyond the sound's maximum distance).
//!
//! Bearings are measured from the listener's forward direction. The unsigned
//! angle between forward and the sound gets 180 added when the sound lies to
//! the listener's left (judged against [`WORLD_UP`]), so straight right is 90,
//! straight behind is 180 and straight left is 270.

use crate::math::{Vec3, WORLD_UP, angle_between_degrees, normalize_or};

/// Attenuation at or beyond the maximum distance.
pub const MAX_ATTENUATION: u8 = 255;

/// Distance ranges are floored to this before dividing.
pub const MIN_DISTANCE_RANGE: f32 = 1.0e-3;

/// Forward direction of a fresh listener, and the fallback for a zero forward.
pub const DEFAULT_FORWARD: Vec3 = Vec3::NEG_Z;

/// The single point of view sounds are positioned against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    position: Vec3,
    forward: Vec3,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: DEFAULT_FORWARD,
        }
    }
}

impl Listener {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// The forward vector as last set, not normalized.
    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_forward(&mut self, forward: Vec3) {
        self.forward = forward;
    }

    /// Normalized facing direction.
    pub fn facing(&self) -> Vec3 {
        normalize_or(self.forward, DEFAULT_FORWARD)
    }
}

/// What the backend needs to place one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanParams {
    /// Degrees clockwise from straight ahead, `0..360`
    pub bearing: i16,
    /// 0 = full volume, 255 = silent
    pub attenuation: u8,
}

/// Bearing of `target` as heard from `origin` facing `facing`, in `[0, 360)`.
pub fn bearing_degrees(origin: Vec3, facing: Vec3, target: Vec3) -> f32 {
    let direction = target - origin;
    let angle = angle_between_degrees(facing, direction);
    let side = direction.cross(facing).dot(WORLD_UP);
    let bearing = if side < 0.0 { angle + 180.0 } else { angle };
    bearing % 360.0
}

/// Distance attenuation for `distance` within `max_distance`.
pub fn attenuation(distance: f32, max_distance: f32) -> u8 {
    let range = if max_distance.is_finite() {
        max_distance.max(MIN_DISTANCE_RANGE)
    } else {
        MIN_DISTANCE_RANGE
    };
    let scaled = distance / range * MAX_ATTENUATION as f32;
    if scaled.is_nan() {
        return MAX_ATTENUATION;
    }
    scaled.clamp(0.0, MAX_ATTENUATION as f32) as u8
}

/// Full transform from a sound position to backend pan parameters.
pub fn compute_pan(listener: &Listener, position: Vec3, max_distance: f32) -> PanParams {
    let bearing = bearing_degrees(listener.position(), listener.facing(), position);
    let distance = (position - listener.position()).length();

    PanParams {
        bearing: (bearing.round() as i16).rem_euclid(360),
        attenuation: attenuation(distance, max_distance),
    }
}
