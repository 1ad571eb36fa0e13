//! Value: the runtime payload carried by sample histories and live attributes.
//! All numeric types use f32.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::functions::{
    hermite_f32, hermite_vec3, lerp_angles, lerp_f32, lerp_vec3, looping_lerp, nlerp_quat,
};

/// Types a [`SampleHistory`](crate::history::SampleHistory) can reconstruct between samples.
///
/// `lerp` must accept `t > 1` (linear extrapolation) and `hermite` must reproduce
/// `p1` at `t = 0` and `p2` at `t = 1`.
pub trait Interpolant: Clone + PartialEq + Debug {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self;

    /// Interpolation for attributes flagged as looping (cycle-like domains).
    fn looping_lerp(from: &Self, to: &Self, t: f32) -> Self {
        Self::lerp(from, to, t)
    }

    fn hermite(p0: &Self, p1: &Self, p2: &Self, t: f32) -> Self {
        let _ = p0;
        Self::lerp(p1, p2, t)
    }
}

impl Interpolant for f32 {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        lerp_f32(*from, *to, t)
    }

    fn looping_lerp(from: &Self, to: &Self, t: f32) -> Self {
        looping_lerp(t, *from, *to)
    }

    fn hermite(p0: &Self, p1: &Self, p2: &Self, t: f32) -> Self {
        hermite_f32(*p0, *p1, *p2, t)
    }
}

impl Interpolant for [f32; 3] {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        lerp_vec3(*from, *to, t)
    }

    fn hermite(p0: &Self, p1: &Self, p2: &Self, t: f32) -> Self {
        hermite_vec3(*p0, *p1, *p2, t)
    }
}

/// Networked state of one animation layer, tracked as a single history entry so that
/// sequence and cycle always change together.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub sequence: i32,
    pub cycle: f32,
    /// Cycle of the incoming sequence just before the switch that produced this sample.
    #[serde(default)]
    pub prev_cycle: f32,
    pub weight: f32,
    #[serde(default = "default_rate")]
    pub playback_rate: f32,
    pub order: i32,
    /// Whether `sequence` loops; decides how `cycle` is blended.
    #[serde(default)]
    pub looping: bool,
}

fn default_rate() -> f32 {
    1.0
}

impl LayerState {
    fn lerp(a: &LayerState, b: &LayerState, t: f32) -> LayerState {
        if a.sequence != b.sequence {
            return *b;
        }
        let cycle = if b.looping {
            looping_lerp(t, a.cycle, b.cycle)
        } else {
            lerp_f32(a.cycle, b.cycle, t)
        };
        LayerState {
            cycle,
            weight: lerp_f32(a.weight, b.weight, t),
            playback_rate: lerp_f32(a.playback_rate, b.playback_rate, t),
            ..*b
        }
    }
}

/// Lightweight kind enum for quick dispatch and error reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Float,
    Vec3,
    Angles,
    Quat,
    Int,
    Layer,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// 3D vector (positions, velocities)
    Vec3([f32; 3]),

    /// Euler angles in degrees (pitch, yaw, roll); blended along the shortest arc
    Angles([f32; 3]),

    /// Quaternion (x, y, z, w)
    Quat([f32; 4]),

    /// Discrete integer (sequence ids, flags); step-only
    Int(i32),

    /// Animation layer state
    Layer(LayerState),
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Angles(_) => ValueKind::Angles,
            Value::Quat(_) => ValueKind::Quat,
            Value::Int(_) => ValueKind::Int,
            Value::Layer(_) => ValueKind::Layer,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Value::Vec3(v) | Value::Angles(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_layer(&self) -> Option<&LayerState> {
        match self {
            Value::Layer(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut LayerState> {
        match self {
            Value::Layer(l) => Some(l),
            _ => None,
        }
    }
}

impl Interpolant for Value {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        match (from, to) {
            (Value::Float(a), Value::Float(b)) => Value::Float(lerp_f32(*a, *b, t)),
            (Value::Vec3(a), Value::Vec3(b)) => Value::Vec3(lerp_vec3(*a, *b, t)),
            (Value::Angles(a), Value::Angles(b)) => Value::Angles(lerp_angles(*a, *b, t)),
            (Value::Quat(a), Value::Quat(b)) => Value::Quat(nlerp_quat(*a, *b, t)),
            (Value::Int(a), Value::Int(b)) => Value::Int(if t >= 1.0 { *b } else { *a }),
            (Value::Layer(a), Value::Layer(b)) => Value::Layer(LayerState::lerp(a, b, t)),
            // Mismatched kinds: hold the newer sample.
            _ => to.clone(),
        }
    }

    fn looping_lerp(from: &Self, to: &Self, t: f32) -> Self {
        match (from, to) {
            (Value::Float(a), Value::Float(b)) => Value::Float(looping_lerp(t, *a, *b)),
            _ => Self::lerp(from, to, t),
        }
    }

    fn hermite(p0: &Self, p1: &Self, p2: &Self, t: f32) -> Self {
        match (p0, p1, p2) {
            (Value::Float(a), Value::Float(b), Value::Float(c)) => {
                Value::Float(hermite_f32(*a, *b, *c, t))
            }
            (Value::Vec3(a), Value::Vec3(b), Value::Vec3(c)) => {
                Value::Vec3(hermite_vec3(*a, *b, *c, t))
            }
            _ => Self::lerp(p1, p2, t),
        }
    }
}
