//! Keyframe animation: clips, sampling and a looping player
//!
//! A clip is a set of channels, each driving one property (translation,
//! rotation or scale) of one node. The player runs every clip of a model at
//! once and loops them forever.

use glam::{Quat, Vec3, Vec4};

use super::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    /// Hermite spline; values are stored as (in-tangent, value, out-tangent) triplets
    CubicSpline,
}

#[derive(Debug, Clone)]
pub enum ChannelValues {
    Translations(Vec<Vec3>),
    Rotations(Vec<Quat>),
    Scales(Vec<Vec3>),
}

/// Animated property of a single node
#[derive(Debug, Clone)]
pub struct Channel {
    pub node: usize,
    pub interpolation: Interpolation,
    /// Key times in seconds, ascending
    pub times: Vec<f32>,
    pub values: ChannelValues,
}

impl Channel {
    /// Write the value at `time` into `node`
    fn apply(&self, time: f32, node: &mut Node) {
        match &self.values {
            ChannelValues::Translations(values) => {
                if let Some(v) = sample(&self.times, values, self.interpolation, time) {
                    node.translation = v;
                }
            }
            ChannelValues::Rotations(values) => {
                if let Some(q) = sample(&self.times, values, self.interpolation, time) {
                    node.rotation = q;
                }
            }
            ChannelValues::Scales(values) => {
                if let Some(v) = sample(&self.times, values, self.interpolation, time) {
                    node.scale = v;
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: Option<String>,
    pub channels: Vec<Channel>,
    /// Time of the last key across all channels
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: Option<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name,
            channels,
            duration,
        }
    }
}

/// Values that can be interpolated between keyframes
pub trait Keyframe: Copy {
    fn lerp(a: Self, b: Self, t: f32) -> Self;

    /// Cubic Hermite segment. Tangents are already scaled by the key interval.
    fn hermite(p0: Self, m0: Self, p1: Self, m1: Self, t: f32) -> Self;

    /// Component-wise scale, used on spline tangents
    fn scaled(self, s: f32) -> Self;
}

fn hermite_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        2.0 * t3 - 3.0 * t2 + 1.0,
        t3 - 2.0 * t2 + t,
        -2.0 * t3 + 3.0 * t2,
        t3 - t2,
    ]
}

impl Keyframe for Vec3 {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }

    fn hermite(p0: Self, m0: Self, p1: Self, m1: Self, t: f32) -> Self {
        let [h00, h10, h01, h11] = hermite_weights(t);
        p0 * h00 + m0 * h10 + p1 * h01 + m1 * h11
    }

    fn scaled(self, s: f32) -> Self {
        self * s
    }
}

impl Keyframe for Quat {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t).normalize()
    }

    fn hermite(p0: Self, m0: Self, p1: Self, m1: Self, t: f32) -> Self {
        let [h00, h10, h01, h11] = hermite_weights(t);
        let v = Vec4::from(p0) * h00 + Vec4::from(m0) * h10 + Vec4::from(p1) * h01 + Vec4::from(m1) * h11;
        Quat::from_vec4(v).normalize()
    }

    fn scaled(self, s: f32) -> Self {
        Quat::from_vec4(Vec4::from(self) * s)
    }
}

/// Sample a keyframe track at `time`.
///
/// Returns `None` for an empty or malformed track. Times outside the key range
/// clamp to the first or last value.
pub fn sample<T: Keyframe>(times: &[f32], values: &[T], interpolation: Interpolation, time: f32) -> Option<T> {
    let stride = match interpolation {
        Interpolation::CubicSpline => 3,
        _ => 1,
    };
    if times.is_empty() || values.len() < times.len() * stride {
        return None;
    }

    let value = |k: usize| match interpolation {
        Interpolation::CubicSpline => values[k * 3 + 1],
        _ => values[k],
    };

    let last = times.len() - 1;
    if time <= times[0] {
        return Some(value(0));
    }
    if time >= times[last] {
        return Some(value(last));
    }

    // times[k] <= time < times[k + 1]
    let k = times.partition_point(|&t| t <= time) - 1;
    let delta = times[k + 1] - times[k];
    let u = if delta > 0.0 { (time - times[k]) / delta } else { 0.0 };

    Some(match interpolation {
        Interpolation::Step => value(k),
        Interpolation::Linear => T::lerp(value(k), value(k + 1), u),
        Interpolation::CubicSpline => {
            let out_tangent = values[k * 3 + 2];
            let in_tangent = values[(k + 1) * 3];
            T::hermite(
                value(k),
                out_tangent.scaled(delta),
                value(k + 1),
                in_tangent.scaled(delta),
                u,
            )
        }
    })
}

/// Plays every clip of a model simultaneously, looping forever
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    clips: Vec<AnimationClip>,
    times: Vec<f32>,
}

impl AnimationPlayer {
    /// `None` when there is nothing to play
    pub fn new(clips: Vec<AnimationClip>) -> Option<Self> {
        if clips.is_empty() {
            return None;
        }
        let times = vec![0.0; clips.len()];
        Some(Self { clips, times })
    }

    /// Local time of clip `index`, in `[0, duration)`
    pub fn time(&self, index: usize) -> f32 {
        self.times[index]
    }

    /// Move every clip forward by `dt` seconds and write the sampled pose into `nodes`
    pub fn advance(&mut self, dt: f32, nodes: &mut [Node]) {
        for (clip, time) in self.clips.iter().zip(self.times.iter_mut()) {
            *time = if clip.duration > 0.0 {
                (*time + dt).rem_euclid(clip.duration)
            } else {
                0.0
            };

            for channel in &clip.channels {
                if let Some(node) = nodes.get_mut(channel.node) {
                    channel.apply(*time, node);
                }
            }
        }
    }
}
