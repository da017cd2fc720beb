//! In-memory stand-in for the hand tracking service, for tests.

use glam::{Quat, Vec3};
use leap::{
    Bone, BoneType, Chirality, DeviceEvent, Finger, FingerType, PointerPose, PolicyFlag,
    RawFrame, RawHandSample, TrackingSource, Vector,
};
use slotmap::{new_key_type, SlotMap};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

pub const SERIAL: &str = "LP00000000001";

/// Microseconds between generated frames (~90Hz).
const FRAME_INTERVAL_US: i64 = 11_111;

struct FingerLayout {
    finger_type: FingerType,
    /// Proximal end of the metacarpal, relative to the wrist.
    base: Vec3,
    knuckle: Vec3,
    /// Proximal, intermediate and distal bone lengths.
    lengths: [f32; 3],
}

// Right hand, palm down, fingers pointing along -Z, in millimetres.
static RIGHT_HAND_LAYOUT: [FingerLayout; 5] = [
    FingerLayout {
        finger_type: FingerType::Thumb,
        base: Vec3::new(-22.0, -6.0, -18.0),
        knuckle: Vec3::new(-22.0, -6.0, -18.0),
        lengths: [38.0, 30.0, 22.0],
    },
    FingerLayout {
        finger_type: FingerType::Index,
        base: Vec3::new(-12.0, 0.0, -10.0),
        knuckle: Vec3::new(-22.0, 0.0, -78.0),
        lengths: [40.0, 25.0, 20.0],
    },
    FingerLayout {
        finger_type: FingerType::Middle,
        base: Vec3::new(-2.0, 0.0, -10.0),
        knuckle: Vec3::new(-2.0, 0.0, -82.0),
        lengths: [44.0, 28.0, 21.0],
    },
    FingerLayout {
        finger_type: FingerType::Ring,
        base: Vec3::new(8.0, 0.0, -10.0),
        knuckle: Vec3::new(17.0, 0.0, -76.0),
        lengths: [40.0, 27.0, 20.0],
    },
    FingerLayout {
        finger_type: FingerType::Pinky,
        base: Vec3::new(16.0, 0.0, -10.0),
        knuckle: Vec3::new(33.0, 0.0, -68.0),
        lengths: [32.0, 20.0, 18.0],
    },
];

const THUMB_DIRECTION: Vec3 = Vec3::new(-0.5, 0.0, -0.85);

/// Builds anatomically plausible hand samples in the service's native frame.
#[derive(Clone, Debug)]
pub struct HandBuilder {
    pub chirality: Chirality,
    pub id: Option<i32>,
    /// Wrist position in millimetres.
    pub position: Vec3,
    pub rotation: Quat,
    /// Bend per finger joint, in radians.
    pub curl: f32,
    pub pointer: Option<PointerPose>,
}

impl HandBuilder {
    pub fn new(chirality: Chirality) -> Self {
        Self {
            chirality,
            id: None,
            position: Vec3::new(0.0, 200.0, 0.0),
            rotation: Quat::IDENTITY,
            curl: 0.0,
            pointer: None,
        }
    }

    pub fn left() -> Self {
        Self::new(Chirality::Left)
    }

    pub fn right() -> Self {
        Self::new(Chirality::Right)
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn curled(mut self, curl: f32) -> Self {
        self.curl = curl;
        self
    }

    pub fn with_pointer(mut self, position: Vec3, rotation: Quat) -> Self {
        self.pointer = Some(PointerPose {
            position: position.into(),
            rotation: rotation.into(),
        });
        self
    }

    pub fn build(&self) -> RawHandSample {
        let mirror = match self.chirality {
            Chirality::Left => Vec3::new(-1.0, 1.0, 1.0),
            Chirality::Right => Vec3::ONE,
        };
        let place = |local: Vec3| -> Vector { (self.position + self.rotation * local).into() };

        let fingers = RIGHT_HAND_LAYOUT
            .iter()
            .map(|layout| {
                let base = layout.base * mirror;
                let knuckle = layout.knuckle * mirror;
                let direction = match layout.finger_type {
                    FingerType::Thumb => (THUMB_DIRECTION * mirror).normalize(),
                    _ => (knuckle - base).normalize(),
                };
                let base_rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);

                let mut bones = Vec::with_capacity(BoneType::ALL.len());
                bones.push(Bone {
                    bone_type: BoneType::Metacarpal,
                    prev_joint: place(base),
                    next_joint: place(knuckle),
                    rotation: (self.rotation * base_rotation).into(),
                });

                let mut joint = knuckle;
                for (i, (bone_type, length)) in BoneType::ALL[1..]
                    .iter()
                    .copied()
                    .zip(layout.lengths)
                    .enumerate()
                {
                    let rotation =
                        base_rotation * Quat::from_rotation_x(-self.curl * (i + 1) as f32);
                    let next = joint + rotation * Vec3::NEG_Z * length;
                    bones.push(Bone {
                        bone_type,
                        prev_joint: place(joint),
                        next_joint: place(next),
                        rotation: (self.rotation * rotation).into(),
                    });
                    joint = next;
                }

                Finger {
                    finger_type: layout.finger_type,
                    bones,
                }
            })
            .collect();

        RawHandSample {
            id: self.id.unwrap_or_default(),
            chirality: self.chirality,
            wrist_position: self.position.into(),
            arm_rotation: self.rotation.into(),
            palm_position: place(Vec3::new(0.0, 0.0, -45.0)),
            palm_rotation: self.rotation.into(),
            fingers,
            pointer: self.pointer,
        }
    }
}

new_key_type! {
    pub struct HandKey;
}

struct State {
    service_available: bool,
    connected: bool,
    hands: SlotMap<HandKey, HandBuilder>,
    next_id: i32,
    frame_id: i64,
    timestamp: i64,
    policies: HashSet<PolicyFlag>,
    reconnect_attempts: u32,
    frame_requests: u32,
    events: VecDeque<DeviceEvent>,
}

/// Cloning shares the underlying service, so tests can keep a handle while a
/// provider owns another.
#[derive(Clone)]
pub struct FakeTrackingSource(Arc<Mutex<State>>);

impl Default for FakeTrackingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTrackingSource {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(State {
            service_available: true,
            connected: false,
            hands: SlotMap::with_key(),
            next_id: 1,
            frame_id: 0,
            timestamp: 0,
            policies: HashSet::new(),
            reconnect_attempts: 0,
            frame_requests: 0,
            events: VecDeque::new(),
        })))
    }

    /// A source whose service can't be reached until [`Self::set_service_available`].
    pub fn unavailable() -> Self {
        let source = Self::new();
        source.state().service_available = false;
        source
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    /// Starts tracking a hand. If the builder has no id, the next free one is assigned.
    pub fn add_hand(&self, mut hand: HandBuilder) -> HandKey {
        let mut state = self.state();
        if hand.id.is_none() {
            hand.id = Some(state.next_id);
            state.next_id += 1;
        }
        state.hands.insert(hand)
    }

    pub fn update_hand(&self, key: HandKey, f: impl FnOnce(&mut HandBuilder)) {
        let mut state = self.state();
        let hand = state.hands.get_mut(key).expect("hand was removed");
        f(hand);
    }

    pub fn hand_id(&self, key: HandKey) -> i32 {
        self.state().hands[key].id.unwrap()
    }

    pub fn remove_hand(&self, key: HandKey) {
        self.state().hands.remove(key);
    }

    pub fn clear_hands(&self) {
        self.state().hands.clear();
    }

    /// Simulates the service going away or coming back, emitting the matching device event.
    pub fn set_service_available(&self, available: bool) {
        let mut state = self.state();
        state.service_available = available;
        if state.connected == available {
            return;
        }
        state.connected = available;
        let serial = SERIAL.to_owned();
        state.events.push_back(if available {
            DeviceEvent::Connected { serial }
        } else {
            DeviceEvent::Disconnected { serial }
        });
    }

    pub fn push_event(&self, event: DeviceEvent) {
        self.state().events.push_back(event);
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.state().reconnect_attempts
    }

    pub fn frame_requests(&self) -> u32 {
        self.state().frame_requests
    }

    pub fn has_policy(&self, flag: PolicyFlag) -> bool {
        self.state().policies.contains(&flag)
    }
}

impl TrackingSource for FakeTrackingSource {
    fn connect(&mut self) {
        let mut state = self.state();
        if state.service_available && !state.connected {
            state.connected = true;
            state.events.push_back(DeviceEvent::Connected {
                serial: SERIAL.to_owned(),
            });
        }
    }

    fn disconnect(&mut self) {
        self.state().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn reconnect(&mut self) {
        self.state().reconnect_attempts += 1;
        self.connect();
    }

    fn set_policy(&mut self, flag: PolicyFlag) {
        self.state().policies.insert(flag);
    }

    fn clear_policy(&mut self, flag: PolicyFlag) {
        self.state().policies.remove(&flag);
    }

    fn frame(&mut self) -> Option<RawFrame> {
        let mut state = self.state();
        state.frame_requests += 1;
        if !state.connected {
            return None;
        }

        state.frame_id += 1;
        state.timestamp += FRAME_INTERVAL_US;
        Some(RawFrame {
            id: state.frame_id,
            timestamp: state.timestamp,
            hands: state.hands.values().map(HandBuilder::build).collect(),
        })
    }

    fn poll_event(&mut self) -> Option<DeviceEvent> {
        self.state().events.pop_front()
    }
}
