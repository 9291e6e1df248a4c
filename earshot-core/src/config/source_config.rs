use crate::math::Vec3;

/// Default maximum audible distance for a new source.
pub const DEFAULT_MAX_DISTANCE: f32 = 255.0;

/// Playback parameters a new sound inherits from its source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceDefaults {
    /// Volume multiplier (0.0 = silent, 1.0 = full volume)
    pub volume: f32,
    /// Position in world space, ignored for music
    pub position: Vec3,
    /// Distance at which the sound is fully attenuated, ignored for music
    pub max_distance: f32,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            volume: 1.0,
            position: Vec3::ZERO,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl SourceDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the volume, clamped to [0, 1].
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the max distance. Values that are not finite and positive are ignored.
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        if is_valid_distance(max_distance) {
            self.max_distance = max_distance;
        }
        self
    }
}

/// A usable distance range: finite and strictly positive.
pub(crate) fn is_valid_distance(distance: f32) -> bool {
    distance.is_finite() && distance > 0.0
}
