//! Opaque handles for sound sources and playing sounds.

use std::fmt;

/// Handle to a loaded sound source.
///
/// Returned by [`EarshotWorld::load_source`](crate::EarshotWorld::load_source).
/// [`SoundSourceHandle::INVALID`] is never produced by a world and can be used
/// as an "unset" value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundSourceHandle(i64);

/// Handle to one playing instance of a source.
///
/// A sound handle stays valid until the sound finishes (naturally or after a
/// stop). [`SoundHandle::INVALID`] is never produced by a world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundHandle(i64);

macro_rules! handle_impls {
    ($name:ident) => {
        impl $name {
            /// Sentinel for "no handle".
            pub const INVALID: Self = Self(-1);

            /// Wraps a raw value, e.g. one stored by the application earlier.
            pub const fn from_raw(value: i64) -> Self {
                Self(value)
            }

            pub const fn value(self) -> i64 {
                self.0
            }

            /// True unless this is the [`INVALID`](Self::INVALID) sentinel.
            ///
            /// This does not say whether the world still knows the handle.
            pub const fn is_set(self) -> bool {
                self.0 != -1
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl From<$name> for i64 {
            fn from(handle: $name) -> i64 {
                handle.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

handle_impls!(SoundSourceHandle);
handle_impls!(SoundHandle);

/// Hands out handles from two independent counters.
///
/// Both counters start at zero and only ever increase, so a value is never
/// handed out twice by the same registry.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    next_source: i64,
    next_sound: i64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_source(&mut self) -> SoundSourceHandle {
        let handle = SoundSourceHandle(self.next_source);
        self.next_source += 1;
        handle
    }

    pub fn next_sound(&mut self) -> SoundHandle {
        let handle = SoundHandle(self.next_sound);
        self.next_sound += 1;
        handle
    }
}
