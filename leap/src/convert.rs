use super::*;
use glam::{Quat, Vec3};

// These conversions are raw: no unit scaling and no change of handedness.

impl From<Vector> for Vec3 {
    #[inline]
    fn from(value: Vector) -> Self {
        Vec3::new(value.x, value.y, value.z)
    }
}

impl From<Vec3> for Vector {
    #[inline]
    fn from(value: Vec3) -> Self {
        Self::new(value.x, value.y, value.z)
    }
}

impl From<LeapQuaternion> for Quat {
    #[inline]
    fn from(value: LeapQuaternion) -> Self {
        Quat::from_xyzw(value.x, value.y, value.z, value.w)
    }
}

impl From<Quat> for LeapQuaternion {
    #[inline]
    fn from(value: Quat) -> Self {
        Self::new(value.x, value.y, value.z, value.w)
    }
}

pub fn is_finite_vector(value: &Vector) -> bool {
    Vec3::from(*value).is_finite()
}

pub fn is_finite_quaternion(value: &LeapQuaternion) -> bool {
    Quat::from(*value).is_finite()
}
