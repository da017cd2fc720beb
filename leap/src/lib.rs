//! Boundary types for a hand tracking source that reports hands the way the Ultraleap
//! service does: right-handed coordinates, millimetres, four bones per finger.

mod convert;

pub use convert::{is_finite_quaternion, is_finite_vector};

/// A position or direction in the tracking source's native frame (millimetres, right-handed).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeapQuaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl LeapQuaternion {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for LeapQuaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Chirality {
    Left,
    Right,
}

#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FingerType {
    Thumb = 0,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl FingerType {
    /// Canonical finger order within a hand sample.
    pub const ALL: [FingerType; 5] = [
        FingerType::Thumb,
        FingerType::Index,
        FingerType::Middle,
        FingerType::Ring,
        FingerType::Pinky,
    ];
}

#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoneType {
    Metacarpal = 0,
    Proximal,
    Intermediate,
    Distal,
}

impl BoneType {
    /// Canonical bone order within a finger, from the palm outwards.
    pub const ALL: [BoneType; 4] = [
        BoneType::Metacarpal,
        BoneType::Proximal,
        BoneType::Intermediate,
        BoneType::Distal,
    ];
}

/// A single bone segment. `prev_joint` is the end closer to the wrist.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bone {
    pub bone_type: BoneType,
    pub prev_joint: Vector,
    pub next_joint: Vector,
    pub rotation: LeapQuaternion,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Finger {
    pub finger_type: FingerType,
    /// Metacarpal to distal. The thumb reports a zero length metacarpal.
    pub bones: Vec<Bone>,
}

impl Finger {
    #[inline]
    pub fn bone(&self, bone_type: BoneType) -> Option<&Bone> {
        self.bones.get(bone_type as usize)
    }
}

/// Pointer-equivalent pose reported by device firmware.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerPose {
    pub position: Vector,
    pub rotation: LeapQuaternion,
}

/// One tracked hand, as delivered by the tracking source for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RawHandSample {
    /// Stable for as long as the source keeps tracking the same physical hand.
    pub id: i32,
    pub chirality: Chirality,
    pub wrist_position: Vector,
    /// Orientation of the forearm basis at the wrist.
    pub arm_rotation: LeapQuaternion,
    pub palm_position: Vector,
    pub palm_rotation: LeapQuaternion,
    /// Thumb, index, middle, ring, pinky.
    pub fingers: Vec<Finger>,
    pub pointer: Option<PointerPose>,
}

impl RawHandSample {
    #[inline]
    pub fn finger(&self, finger_type: FingerType) -> Option<&Finger> {
        self.fingers.get(finger_type as usize)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawFrame {
    pub id: i64,
    /// Microseconds, monotonic.
    pub timestamp: i64,
    pub hands: Vec<RawHandSample>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyFlag {
    Default,
    /// Optimise tracking for a sensor mounted on a head mounted display.
    OptimizeHmd,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    Connected { serial: String },
    Disconnected { serial: String },
    Failure { serial: String, reason: String },
}

/// A hand tracking service connection.
///
/// Everything here is polled from the host's update thread, so implementations
/// don't need to be thread safe.
pub trait TrackingSource {
    /// Opens the connection to the tracking service.
    fn connect(&mut self);
    fn disconnect(&mut self);
    /// Whether the tracking service is currently reachable.
    fn is_connected(&self) -> bool;
    /// Asks the source to try re-establishing a lost service connection.
    fn reconnect(&mut self);
    fn set_policy(&mut self, flag: PolicyFlag);
    fn clear_policy(&mut self, flag: PolicyFlag);
    /// Latest frame, or None if the service has nothing to report.
    fn frame(&mut self) -> Option<RawFrame>;
    fn poll_event(&mut self) -> Option<DeviceEvent>;
}
