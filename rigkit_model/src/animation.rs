//! Utilities for working with animation data.
//!
//! An [Animation] stores keyframes for nodes in the hierarchy by node name.
//! Times are measured in ticks, which are converted from seconds using
//! [Animation::ticks_per_second].
use glam::{Mat4, Quat, Vec3};

use crate::error::CreateModelError;

/// The rate used when an animation does not specify a tick rate.
pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

/// A single animation clip for the nodes in a hierarchy.
#[derive(Debug, PartialEq, Clone)]
pub struct Animation {
    pub name: String,
    /// The length of the animation in ticks.
    pub duration: f32,
    /// The playback rate or `0.0` to use [DEFAULT_TICKS_PER_SECOND].
    pub ticks_per_second: f32,
    pub channels: Vec<Channel>,
}

/// The translation, rotation, and scale keyframes for a single node.
///
/// Keyframes in each list must be sorted by ascending time.
#[derive(Debug, PartialEq, Clone)]
pub struct Channel {
    /// The name of the [Node](crate::Node) animated by this channel.
    pub node_name: String,
    pub translation_keys: Vec<Keyframe<Vec3>>,
    pub rotation_keys: Vec<Keyframe<Quat>>,
    pub scale_keys: Vec<Keyframe<Vec3>>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Keyframe<T> {
    /// The time in ticks.
    pub time: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TrackKind {
    Translation,
    Rotation,
    Scale,
}

/// How to sample times at or after the final keyframe of a track.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum KeyframeFallback {
    /// Hold the value of the final keyframe.
    #[default]
    Clamp,
    /// Use the value of the first keyframe.
    /// This matches tools that restart the search at the first pair of keyframes.
    /// The interpolation factor is pinned to `0.0` rather than extrapolated past the second keyframe.
    FirstBracket,
}

/// A local transform sampled from a [Channel].
///
/// The matrix applies scale, then rotation, then translation (`T * R * S`).
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Split an evaluated matrix back into its components.
    /// Shear is not representable and is lost.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

impl Animation {
    /// The tick rate with [DEFAULT_TICKS_PER_SECOND] applied for unspecified rates.
    pub fn ticks_per_second(&self) -> f32 {
        if self.ticks_per_second != 0.0 {
            self.ticks_per_second
        } else {
            DEFAULT_TICKS_PER_SECOND
        }
    }

    /// The length of the animation in seconds.
    pub fn duration_seconds(&self) -> f32 {
        self.duration / self.ticks_per_second()
    }

    /// Convert `time_seconds` to ticks and wrap to the animation duration.
    ///
    /// Animations always loop.
    /// Animations with no duration are always sampled at tick `0.0`.
    pub fn animation_time(&self, time_seconds: f32) -> f32 {
        let ticks = time_seconds * self.ticks_per_second();
        if self.duration > 0.0 {
            let time = ticks.rem_euclid(self.duration);
            // Rounding can return the duration itself for tiny negative times.
            if time < self.duration { time } else { 0.0 }
        } else {
            0.0
        }
    }

    /// The channel animating the node with the given `node_name`.
    pub fn channel(&self, node_name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.node_name == node_name)
    }

    pub(crate) fn channel_index(&self, node_name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.node_name == node_name)
    }

    pub(crate) fn validate(&self) -> Result<(), CreateModelError> {
        for channel in &self.channels {
            let empty = if channel.translation_keys.is_empty() {
                Some(TrackKind::Translation)
            } else if channel.rotation_keys.is_empty() {
                Some(TrackKind::Rotation)
            } else if channel.scale_keys.is_empty() {
                Some(TrackKind::Scale)
            } else {
                None
            };

            if let Some(kind) = empty {
                return Err(CreateModelError::EmptyKeyframes {
                    node_name: channel.node_name.clone(),
                    kind,
                });
            }
        }
        Ok(())
    }
}

impl Channel {
    /// Sample the translation at `time` in ticks using linear interpolation.
    /// Returns `None` if there are no keyframes.
    pub fn sample_translation(&self, time: f32, fallback: KeyframeFallback) -> Option<Vec3> {
        sample_keyframes(&self.translation_keys, time, fallback)
    }

    /// Sample the rotation at `time` in ticks using spherical linear interpolation.
    /// Returns `None` if there are no keyframes.
    pub fn sample_rotation(&self, time: f32, fallback: KeyframeFallback) -> Option<Quat> {
        sample_keyframes(&self.rotation_keys, time, fallback)
    }

    /// Sample the scale at `time` in ticks using linear interpolation.
    /// Returns `None` if there are no keyframes.
    pub fn sample_scale(&self, time: f32, fallback: KeyframeFallback) -> Option<Vec3> {
        sample_keyframes(&self.scale_keys, time, fallback)
    }

    /// Sample and combine the values for translation, rotation, and scale.
    /// Returns `None` if any of the tracks have no keyframes.
    pub fn sample_transform(&self, time: f32, fallback: KeyframeFallback) -> Option<Transform> {
        Some(Transform {
            translation: self.sample_translation(time, fallback)?,
            rotation: self.sample_rotation(time, fallback)?,
            scale: self.sample_scale(time, fallback)?,
        })
    }
}

trait Interpolate: Copy {
    fn interpolate(self, end: Self, factor: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(self, end: Self, factor: f32) -> Self {
        self.lerp(end, factor)
    }
}

impl Interpolate for Quat {
    fn interpolate(self, end: Self, factor: f32) -> Self {
        // Remove any drift from unit length.
        self.slerp(end, factor).normalize()
    }
}

fn sample_keyframes<T: Interpolate>(
    keyframes: &[Keyframe<T>],
    time: f32,
    fallback: KeyframeFallback,
) -> Option<T> {
    match keyframes {
        [] => None,
        [keyframe] => Some(keyframe.value),
        _ => {
            let (index, factor) = keyframe_position(keyframes, time, fallback);
            let start = keyframes[index].value;
            let end = keyframes[index + 1].value;
            // Return exact values at keyframes.
            if factor <= 0.0 {
                Some(start)
            } else if factor >= 1.0 {
                Some(end)
            } else {
                Some(start.interpolate(end, factor))
            }
        }
    }
}

/// Find the index of the keyframe starting the range containing `time`
/// and the interpolation factor between that keyframe and the next.
///
/// This assumes at least two keyframes sorted by ascending time.
fn keyframe_position<T>(
    keyframes: &[Keyframe<T>],
    time: f32,
    fallback: KeyframeFallback,
) -> (usize, f32) {
    // The index of the first keyframe after time.
    let next = keyframes.partition_point(|k| k.time <= time);
    if next == 0 {
        // Hold the first keyframe for times before the animation starts.
        (0, 0.0)
    } else if next == keyframes.len() {
        match fallback {
            KeyframeFallback::Clamp => (keyframes.len() - 2, 1.0),
            KeyframeFallback::FirstBracket => (0, 0.0),
        }
    } else {
        let index = next - 1;
        let start = keyframes[index].time;
        let end = keyframes[next].time;
        (index, (time - start) / (end - start))
    }
}
