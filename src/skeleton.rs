use leap::Chirality;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    Left = 1,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];

    /// Index into per-hand arrays.
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self as usize - 1
    }
}

impl From<Chirality> for Hand {
    #[inline]
    fn from(value: Chirality) -> Self {
        match value {
            Chirality::Left => Hand::Left,
            Chirality::Right => Hand::Right,
        }
    }
}

/// Canonical joint layout of a [`HandFrame`](crate::converter::HandFrame).
///
/// The thumb has no intermediate joint; every other finger runs metacarpal to tip.
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandJoint {
    Wrist = 0,
    Palm,
    ThumbMetacarpal,
    ThumbProximal,
    ThumbDistal,
    ThumbTip,
    IndexMetacarpal,
    IndexProximal,
    IndexIntermediate,
    IndexDistal,
    IndexTip,
    MiddleMetacarpal,
    MiddleProximal,
    MiddleIntermediate,
    MiddleDistal,
    MiddleTip,
    RingMetacarpal,
    RingProximal,
    RingIntermediate,
    RingDistal,
    RingTip,
    LittleMetacarpal,
    LittleProximal,
    LittleIntermediate,
    LittleDistal,
    LittleTip,
    Count,
}

pub const JOINT_COUNT: usize = HandJoint::Count as usize;

impl HandJoint {
    pub const ALL: [HandJoint; JOINT_COUNT] = {
        use HandJoint::*;
        [
            Wrist,
            Palm,
            ThumbMetacarpal,
            ThumbProximal,
            ThumbDistal,
            ThumbTip,
            IndexMetacarpal,
            IndexProximal,
            IndexIntermediate,
            IndexDistal,
            IndexTip,
            MiddleMetacarpal,
            MiddleProximal,
            MiddleIntermediate,
            MiddleDistal,
            MiddleTip,
            RingMetacarpal,
            RingProximal,
            RingIntermediate,
            RingDistal,
            RingTip,
            LittleMetacarpal,
            LittleProximal,
            LittleIntermediate,
            LittleDistal,
            LittleTip,
        ]
    };

    /// Joints the sensor doesn't report, paired with the knuckle they're estimated from.
    pub const ESTIMATED: [(HandJoint, HandJoint); 3] = [
        (HandJoint::IndexMetacarpal, HandJoint::IndexProximal),
        (HandJoint::MiddleMetacarpal, HandJoint::MiddleProximal),
        (HandJoint::RingMetacarpal, HandJoint::RingProximal),
    ];

    pub fn is_estimated(self) -> bool {
        Self::ESTIMATED.iter().any(|(joint, _)| *joint == self)
    }
}
