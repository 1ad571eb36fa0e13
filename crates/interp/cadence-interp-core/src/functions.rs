//! Interpolation helpers:
//! - lerp_f32 / lerp_vec3 (component-wise)
//! - looping_lerp (shortest modular path through the [0,1) cycle domain)
//! - lerp_angle_deg / lerp_angles (shortest arc, degrees)
//! - quaternion NLERP with shortest-arc normalization
//! - hermite_f32 / hermite_vec3 (three-sample cubic used for smooth networked motion)

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

/// Wrap any finite value into [0,1).
#[inline]
pub fn wrap_unit(s: f32) -> f32 {
    let m = s - s.trunc();
    if m < 0.0 {
        m + 1.0
    } else {
        m
    }
}

/// Interpolate two cycle values along the shorter way around the unit loop.
///
/// `looping_lerp(0.5, 0.95, 0.05)` travels forward through 1.0 and lands on 0.0,
/// never backward through 0.5.
#[inline]
pub fn looping_lerp(t: f32, from: f32, to: f32) -> f32 {
    let (mut from, mut to) = (from, to);
    if (to - from).abs() >= 0.5 {
        if from < to {
            from += 1.0;
        } else {
            to += 1.0;
        }
    }
    wrap_unit(to * t + from * (1.0 - t))
}

/// Shortest-arc interpolation of a single angle in degrees.
#[inline]
pub fn lerp_angle_deg(a: f32, b: f32, t: f32) -> f32 {
    let mut d = (b - a) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    a + d * t
}

/// Euler angles (pitch, yaw, roll) in degrees, each component along its shortest arc.
#[inline]
pub fn lerp_angles(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_angle_deg(a[0], b[0], t),
        lerp_angle_deg(a[1], b[1], t),
        lerp_angle_deg(a[2], b[2], t),
    ]
}

#[inline]
pub fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
pub fn normalize4(mut q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        q[0] *= inv_len;
        q[1] *= inv_len;
        q[2] *= inv_len;
        q[3] *= inv_len;
    }
    q
}

/// Quaternion NLERP with shortest-arc correction.
/// If dot < 0, negate the second quaternion to ensure the shortest path.
/// Returns a normalized quaternion (x,y,z,w).
#[inline]
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    if dot4(a, b) < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    normalize4([
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ])
}

/// Cubic Hermite through `p1` (t = 0) and `p2` (t = 1), with tangents taken from
/// the neighbouring segments `p0 -> p1` and `p1 -> p2`.
///
/// Callers rescale `p0` so both segments span the same duration before calling.
#[inline]
pub fn hermite_f32(p0: f32, p1: f32, p2: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t * t2;
    let b1 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let b2 = 1.0 - b1;
    let b3 = t3 - 2.0 * t2 + t;
    let b4 = t3 - t2;
    p1 * b1 + p2 * b2 + (p1 - p0) * b3 + (p2 - p1) * b4
}

#[inline]
pub fn hermite_vec3(p0: [f32; 3], p1: [f32; 3], p2: [f32; 3], t: f32) -> [f32; 3] {
    [
        hermite_f32(p0[0], p1[0], p2[0], t),
        hermite_f32(p0[1], p1[1], p2[1], t),
        hermite_f32(p0[2], p1[2], p2[2], t),
    ]
}
