mod estimate;


pub use estimate::{estimate_metacarpal, estimate_metacarpals, METACARPAL_BASE_RATIO};

use crate::convert::to_target_pose;
use crate::pose::{look_rotation, Pose};
use crate::profile::DeviceOffset;
use crate::skeleton::{Hand, HandJoint, JOINT_COUNT};
use crate::tracy_span;
use leap::{BoneType, FingerType, RawHandSample};
use log::debug;
use paste::paste;
use serde::Deserialize;
use std::fmt;
use HandJoint::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingState {
    Tracked,
    NotTracked,
}

/// Which space a [`HandFrame`]'s joint poses are expressed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointSpace {
    /// Relative to the frame's root pose.
    #[default]
    HandRoot,
    /// The same space as the root pose.
    World,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerSource {
    /// Reported by the device firmware.
    Platform,
    /// Derived from the thumb and index joints.
    Derived,
}

/// Target frame for a conversion.
///
/// The root pose (and pointer pose) always end up in the anchor's parent space, i.e.
/// `anchor * device offset * wrist`. `joints` picks how the joint poses are expressed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReferenceFrame {
    /// Camera or playspace pose the sensor's tracking origin hangs off.
    pub anchor: Pose,
    pub joints: JointSpace,
}

impl ReferenceFrame {
    pub fn hand_root(anchor: Pose) -> Self {
        Self {
            anchor,
            joints: JointSpace::HandRoot,
        }
    }

    pub fn world(anchor: Pose) -> Self {
        Self {
            anchor,
            joints: JointSpace::World,
        }
    }
}

/// One hand's skeleton for one tick. Never partially populated: either every joint is
/// present, or the frame is [`TrackingState::NotTracked`] and exposes none.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFrame {
    hand: Hand,
    timestamp: i64,
    root: Pose,
    space: JointSpace,
    joints: Option<[Pose; JOINT_COUNT]>,
    pointer: Option<(Pose, PointerSource)>,
}

impl HandFrame {
    pub fn not_tracked(hand: Hand, timestamp: i64) -> Self {
        Self {
            hand,
            timestamp,
            root: Pose::IDENTITY,
            space: JointSpace::HandRoot,
            joints: None,
            pointer: None,
        }
    }

    #[inline]
    pub fn hand(&self) -> Hand {
        self.hand
    }

    #[inline]
    pub fn tracking_state(&self) -> TrackingState {
        if self.joints.is_some() {
            TrackingState::Tracked
        } else {
            TrackingState::NotTracked
        }
    }

    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.joints.is_some()
    }

    /// Microseconds, from the source frame.
    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[inline]
    pub fn root_pose(&self) -> Pose {
        self.root
    }

    #[inline]
    pub fn joint_space(&self) -> JointSpace {
        self.space
    }

    #[inline]
    pub fn joints(&self) -> Option<&[Pose; JOINT_COUNT]> {
        self.joints.as_ref()
    }

    #[inline]
    pub fn joint(&self, joint: HandJoint) -> Option<Pose> {
        self.joints.as_ref().and_then(|j| j.get(joint as usize)).copied()
    }

    /// In the same space as the root pose.
    #[inline]
    pub fn pointer_pose(&self) -> Option<Pose> {
        self.pointer.map(|(pose, _)| pose)
    }

    #[inline]
    pub fn pointer_source(&self) -> Option<PointerSource> {
        self.pointer.map(|(_, source)| source)
    }

    /// This frame with joints expressed in the root pose's space.
    pub fn in_world(&self) -> HandFrame {
        match self.space {
            JointSpace::World => self.clone(),
            JointSpace::HandRoot => self.map_joints(JointSpace::World, |joint| self.root * joint),
        }
    }

    /// This frame with joints expressed relative to the root pose.
    pub fn root_relative(&self) -> HandFrame {
        match self.space {
            JointSpace::HandRoot => self.clone(),
            JointSpace::World => {
                let inverse = self.root.inverse();
                self.map_joints(JointSpace::HandRoot, |joint| inverse * joint)
            }
        }
    }

    fn map_joints(&self, space: JointSpace, f: impl Fn(Pose) -> Pose) -> HandFrame {
        HandFrame {
            space,
            joints: self.joints.map(|joints| joints.map(f)),
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConvertError {
    FingerCount(usize),
    FingerOrder {
        index: usize,
        found: FingerType,
    },
    BoneCount {
        finger: FingerType,
        count: usize,
    },
    BoneOrder {
        finger: FingerType,
        index: usize,
        found: BoneType,
    },
    NonFiniteInput,
    InvalidRoot,
    InvalidJoint(HandJoint),
    InvalidPointer,
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::FingerCount(count) => {
                write!(f, "expected {FINGER_COUNT} fingers, got {count}")
            }
            ConvertError::FingerOrder { index, found } => {
                write!(f, "finger {index} is {found:?}, expected {:?}", FingerType::ALL[*index])
            }
            ConvertError::BoneCount { finger, count } => {
                write!(f, "{finger:?} has {count} bones, expected {BONES_PER_FINGER}")
            }
            ConvertError::BoneOrder {
                finger,
                index,
                found,
            } => write!(
                f,
                "{finger:?} bone {index} is {found:?}, expected {:?}",
                BoneType::ALL[*index]
            ),
            ConvertError::NonFiniteInput => f.write_str("sample contains non-finite values"),
            ConvertError::InvalidRoot => f.write_str("root pose is not a valid pose"),
            ConvertError::InvalidJoint(joint) => write!(f, "{joint:?} is not a valid pose"),
            ConvertError::InvalidPointer => f.write_str("pointer pose is not a valid pose"),
        }
    }
}

impl std::error::Error for ConvertError {}

const FINGER_COUNT: usize = FingerType::ALL.len();
const BONES_PER_FINGER: usize = BoneType::ALL.len();

/// Where an observed joint comes from in the raw sample.
#[derive(Clone, Copy)]
enum JointSource {
    /// `next_joint` of the `position` bone, oriented like the `rotation` bone.
    Next {
        finger: FingerType,
        position: BoneType,
        rotation: BoneType,
    },
    /// `prev_joint` of the `position` bone, oriented like the `rotation` bone.
    Prev {
        finger: FingerType,
        position: BoneType,
        rotation: BoneType,
    },
}

impl JointSource {
    /// Only valid on samples that passed [`validate_layout`].
    fn locate(self, sample: &RawHandSample) -> Pose {
        let (finger, position, rotation, prev) = match self {
            JointSource::Next {
                finger,
                position,
                rotation,
            } => (finger, position, rotation, false),
            JointSource::Prev {
                finger,
                position,
                rotation,
            } => (finger, position, rotation, true),
        };
        let bones = &sample.fingers[finger as usize].bones;
        let bone = &bones[position as usize];
        let point = if prev {
            bone.prev_joint
        } else {
            bone.next_joint
        };
        to_target_pose(point, bones[rotation as usize].rotation)
    }
}

macro_rules! joints_for_finger {
    ($finger:ident, $leap_finger:ident) => {
        paste! {[
            ([<$finger Proximal>], JointSource::Next {
                finger: FingerType::$leap_finger,
                position: BoneType::Metacarpal,
                rotation: BoneType::Proximal,
            }),
            ([<$finger Intermediate>], JointSource::Next {
                finger: FingerType::$leap_finger,
                position: BoneType::Proximal,
                rotation: BoneType::Intermediate,
            }),
            ([<$finger Distal>], JointSource::Next {
                finger: FingerType::$leap_finger,
                position: BoneType::Intermediate,
                rotation: BoneType::Distal,
            }),
            ([<$finger Tip>], JointSource::Next {
                finger: FingerType::$leap_finger,
                position: BoneType::Distal,
                rotation: BoneType::Distal,
            })
        ].as_slice()}
    };
}

// Every joint except the wrist, the palm and the estimated metacarpals.
static OBSERVED_JOINTS: &[&[(HandJoint, JointSource)]] = &[
    &[
        (
            ThumbMetacarpal,
            JointSource::Next {
                finger: FingerType::Thumb,
                position: BoneType::Metacarpal,
                rotation: BoneType::Proximal,
            },
        ),
        (
            ThumbProximal,
            JointSource::Next {
                finger: FingerType::Thumb,
                position: BoneType::Proximal,
                rotation: BoneType::Intermediate,
            },
        ),
        (
            ThumbDistal,
            JointSource::Next {
                finger: FingerType::Thumb,
                position: BoneType::Intermediate,
                rotation: BoneType::Distal,
            },
        ),
        (
            ThumbTip,
            JointSource::Next {
                finger: FingerType::Thumb,
                position: BoneType::Distal,
                rotation: BoneType::Distal,
            },
        ),
    ],
    joints_for_finger!(Index, Index),
    joints_for_finger!(Middle, Middle),
    joints_for_finger!(Ring, Ring),
    // The little finger's metacarpal is the only one the sensor gives us a usable root
    // for: the start of its metacarpal bone.
    &[(
        LittleMetacarpal,
        JointSource::Prev {
            finger: FingerType::Pinky,
            position: BoneType::Metacarpal,
            rotation: BoneType::Proximal,
        },
    )],
    joints_for_finger!(Little, Pinky),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConverterOptions {
    /// Derive a pointer pose when the device doesn't report one.
    pub derive_pointer_pose: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            derive_pointer_pose: true,
        }
    }
}

/// Turns raw hand samples into [`HandFrame`]s.
///
/// Holds no per-call state, so the same sample converted twice yields identical frames.
#[derive(Clone, Debug)]
pub struct HandPoseConverter {
    mount: Pose,
    options: ConverterOptions,
}

impl HandPoseConverter {
    pub fn new(device_offset: DeviceOffset, options: ConverterOptions) -> Self {
        Self {
            mount: device_offset.pose(),
            options,
        }
    }

    /// Like [`Self::convert`], but a failure yields a not tracked frame instead of an error.
    pub fn try_convert(
        &self,
        sample: &RawHandSample,
        timestamp: i64,
        frame: &ReferenceFrame,
    ) -> (bool, HandFrame) {
        match self.convert(sample, timestamp, frame) {
            Ok(hand_frame) => (true, hand_frame),
            Err(e) => {
                debug!(
                    "{:?} hand (id {}) reported as not tracked: {e}",
                    sample.chirality, sample.id
                );
                (false, HandFrame::not_tracked(sample.chirality.into(), timestamp))
            }
        }
    }

    pub fn convert(
        &self,
        sample: &RawHandSample,
        timestamp: i64,
        frame: &ReferenceFrame,
    ) -> Result<HandFrame, ConvertError> {
        tracy_span!("HandPoseConverter::convert");
        validate_layout(sample)?;

        let tracking_origin = frame.anchor * self.mount;
        let root = tracking_origin * to_target_pose(sample.wrist_position, sample.arm_rotation);
        if !root.is_valid() {
            return Err(ConvertError::InvalidRoot);
        }

        let mut joints = [Pose::IDENTITY; JOINT_COUNT];
        joints[Wrist as usize] = root;
        joints[Palm as usize] =
            tracking_origin * to_target_pose(sample.palm_position, sample.palm_rotation);
        for (joint, source) in OBSERVED_JOINTS.iter().flat_map(|list| list.iter()).copied() {
            joints[joint as usize] = tracking_origin * source.locate(sample);
        }

        if frame.joints == JointSpace::HandRoot {
            let inverse = root.inverse();
            for joint in joints.iter_mut() {
                *joint = inverse * *joint;
            }
        }

        // Needs every observed joint to be in place already.
        estimate_metacarpals(&mut joints);

        if let Some(joint) = HandJoint::ALL
            .iter()
            .copied()
            .find(|joint| !joints[*joint as usize].is_valid())
        {
            return Err(ConvertError::InvalidJoint(joint));
        }

        let pointer = match sample.pointer {
            Some(pointer) => Some((
                tracking_origin * to_target_pose(pointer.position, pointer.rotation),
                PointerSource::Platform,
            )),
            None if self.options.derive_pointer_pose => Some((
                derive_pointer_pose(&joints, frame.joints, &root, &tracking_origin),
                PointerSource::Derived,
            )),
            None => None,
        };
        if pointer.is_some_and(|(pose, _)| !pose.is_valid()) {
            return Err(ConvertError::InvalidPointer);
        }

        Ok(HandFrame {
            hand: sample.chirality.into(),
            timestamp,
            root,
            space: frame.joints,
            joints: Some(joints),
            pointer,
        })
    }
}

fn validate_layout(sample: &RawHandSample) -> Result<(), ConvertError> {
    if sample.fingers.len() != FINGER_COUNT {
        return Err(ConvertError::FingerCount(sample.fingers.len()));
    }

    for (index, (finger, expected)) in sample.fingers.iter().zip(FingerType::ALL).enumerate() {
        if finger.finger_type != expected {
            return Err(ConvertError::FingerOrder {
                index,
                found: finger.finger_type,
            });
        }
        if finger.bones.len() != BONES_PER_FINGER {
            return Err(ConvertError::BoneCount {
                finger: finger.finger_type,
                count: finger.bones.len(),
            });
        }
        for (index, (bone, expected)) in finger.bones.iter().zip(BoneType::ALL).enumerate() {
            if bone.bone_type != expected {
                return Err(ConvertError::BoneOrder {
                    finger: finger.finger_type,
                    index,
                    found: bone.bone_type,
                });
            }
            if !leap::is_finite_vector(&bone.prev_joint)
                || !leap::is_finite_vector(&bone.next_joint)
                || !leap::is_finite_quaternion(&bone.rotation)
            {
                return Err(ConvertError::NonFiniteInput);
            }
        }
    }

    if !leap::is_finite_vector(&sample.wrist_position)
        || !leap::is_finite_vector(&sample.palm_position)
        || !leap::is_finite_quaternion(&sample.arm_rotation)
        || !leap::is_finite_quaternion(&sample.palm_rotation)
    {
        return Err(ConvertError::NonFiniteInput);
    }

    Ok(())
}

/// Halfway between the thumb's proximal joint and the index finger's distal joint, facing
/// along the tracking origin's forward axis with the hand's up axis.
fn derive_pointer_pose(
    joints: &[Pose; JOINT_COUNT],
    space: JointSpace,
    root: &Pose,
    tracking_origin: &Pose,
) -> Pose {
    let midpoint =
        joints[ThumbProximal as usize].position.lerp(joints[IndexDistal as usize].position, 0.5);
    let position = match space {
        JointSpace::HandRoot => root.transform_point(midpoint),
        JointSpace::World => midpoint,
    };
    let rotation =
        look_rotation(tracking_origin.forward(), root.up()).unwrap_or(root.rotation);
    Pose::new(position, rotation)
}
