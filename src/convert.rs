//! Conversion between the tracking service's frame (right-handed, millimetres) and ours
//! (left-handed, metres, +Y up, +Z forward).
//!
//! The handedness change mirrors Z. Positions negate z. A rotation conjugated by that
//! mirror keeps its z component and negates x and y; orientations go through that
//! directly, never through Euler angles, so positions and orientations always agree.

use crate::pose::Pose;
use glam::{Quat, Vec3};
use leap::{LeapQuaternion, Vector};

pub const MILLIMETERS_TO_METERS: f32 = 1e-3;

#[inline]
pub fn to_target_position(value: Vector) -> Vec3 {
    let v = Vec3::from(value) * MILLIMETERS_TO_METERS;
    Vec3::new(v.x, v.y, -v.z)
}

/// The result is normalized, since the service doesn't guarantee exactly unit quaternions.
#[inline]
pub fn to_target_rotation(value: LeapQuaternion) -> Quat {
    Quat::from_xyzw(-value.x, -value.y, value.z, value.w).normalize()
}

#[inline]
pub fn to_target_pose(position: Vector, rotation: LeapQuaternion) -> Pose {
    Pose::new(to_target_position(position), to_target_rotation(rotation))
}

#[inline]
pub fn to_sensor_position(value: Vec3) -> Vector {
    let v = value / MILLIMETERS_TO_METERS;
    Vector::new(v.x, v.y, -v.z)
}

#[inline]
pub fn to_sensor_rotation(value: Quat) -> LeapQuaternion {
    LeapQuaternion::new(-value.x, -value.y, value.z, value.w)
}
