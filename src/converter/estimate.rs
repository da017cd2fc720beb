use crate::pose::{look_rotation, Pose};
use crate::skeleton::{HandJoint, JOINT_COUNT};

/// How far from the wrist towards the knuckle a metacarpal's base sits.
pub const METACARPAL_BASE_RATIO: f32 = 0.25;

/// Fills in the index, middle and ring metacarpals from the wrist and knuckle joints.
pub fn estimate_metacarpals(joints: &mut [Pose; JOINT_COUNT]) {
    let wrist = joints[HandJoint::Wrist as usize];
    for (metacarpal, knuckle) in HandJoint::ESTIMATED {
        joints[metacarpal as usize] = estimate_metacarpal(&wrist, &joints[knuckle as usize]);
    }
}

/// The metacarpal base lies on the wrist-knuckle line, oriented along the bone with the
/// wrist's up axis. Falls back to the wrist's orientation when the bone has no direction.
pub fn estimate_metacarpal(wrist: &Pose, knuckle: &Pose) -> Pose {
    let position = wrist.position.lerp(knuckle.position, METACARPAL_BASE_RATIO);
    let rotation =
        look_rotation(knuckle.position - position, wrist.up()).unwrap_or(wrist.rotation);
    Pose::new(position, rotation)
}
