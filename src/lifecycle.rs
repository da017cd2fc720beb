
use crate::converter::HandFrame;
use crate::skeleton::Hand;
use crate::warn_once;
use log::{debug, error, trace, warn};
use serde::Deserialize;
use std::fmt;

/// Consumer side of hand tracking: owns whatever object represents a tracked hand.
pub trait ControllerRegistry {
    type Controller;

    /// A hand appeared. On error no controller exists and the hand is offered again next tick.
    fn hand_detected(&mut self, hand: Hand) -> Result<Self::Controller, RegistryError>;
    fn hand_updated(&mut self, controller: &mut Self::Controller, frame: &HandFrame);
    /// The hand went away; the controller is handed back for disposal.
    fn hand_lost(&mut self, hand: Hand, controller: Self::Controller);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryError(pub String);

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RegistryError {}

/// What to do when a hand shows up with a different id than the one bound to its slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdChangePolicy {
    /// Drop the sample and release the slot. Whichever id shows up next binds afresh.
    #[default]
    RejectUntilLoss,
    /// Release the old controller and bind the new id within the same tick.
    RebindImmediately,
}

/// A hand the tracking source reported this tick. `frame` is None if it couldn't be
/// converted, in which case the hand counts as absent.
#[derive(Clone, Debug)]
pub struct Observation {
    pub hand: Hand,
    pub id: i32,
    pub frame: Option<HandFrame>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandReport {
    pub detected: bool,
    pub updated: bool,
    pub lost: bool,
    /// The sample's id didn't match the bound one.
    pub rejected: bool,
    /// The registry failed to create a controller.
    pub failed: bool,
}

/// What happened to each slot during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserveReport {
    hands: [HandReport; 2],
}

impl ObserveReport {
    #[inline]
    pub fn hand(&self, hand: Hand) -> &HandReport {
        &self.hands[hand.slot()]
    }

    #[inline]
    fn hand_mut(&mut self, hand: Hand) -> &mut HandReport {
        &mut self.hands[hand.slot()]
    }

    pub fn is_tracked(&self, hand: Hand) -> bool {
        let report = self.hand(hand);
        report.detected || report.updated
    }
}

enum Slot<C> {
    Unbound,
    Bound { id: i32, controller: C },
}

/// Binds the source's per-hand ids to consumer controllers, one slot per laterality.
pub struct HandLifecycleTracker<C> {
    slots: [Slot<C>; 2],
    policy: IdChangePolicy,
}

impl<C> HandLifecycleTracker<C> {
    pub fn new(policy: IdChangePolicy) -> Self {
        Self {
            slots: [Slot::Unbound, Slot::Unbound],
            policy,
        }
    }

    pub fn bound_id(&self, hand: Hand) -> Option<i32> {
        match &self.slots[hand.slot()] {
            Slot::Bound { id, .. } => Some(*id),
            Slot::Unbound => None,
        }
    }

    pub fn controller(&self, hand: Hand) -> Option<&C> {
        match &self.slots[hand.slot()] {
            Slot::Bound { controller, .. } => Some(controller),
            Slot::Unbound => None,
        }
    }

    /// Whether a sample with this id would be accepted for the hand's slot.
    pub fn accepts(&self, hand: Hand, id: i32) -> bool {
        match (self.policy, self.bound_id(hand)) {
            (IdChangePolicy::RejectUntilLoss, Some(bound)) => bound == id,
            _ => true,
        }
    }

    /// Runs one tick. The first sample of each laterality that passes the id check is used and
    /// later ones are ignored. Slots whose hand isn't among the accepted observations are
    /// released.
    pub fn observe<R>(
        &mut self,
        registry: &mut R,
        observations: impl IntoIterator<Item = Observation>,
    ) -> ObserveReport
    where
        R: ControllerRegistry<Controller = C>,
    {
        let mut report = ObserveReport::default();
        let mut seen = [false; 2];
        let mut present = [false; 2];

        for Observation { hand, id, frame } in observations {
            if seen[hand.slot()] {
                warn_once!("More than one hand of the same laterality in a frame, ignoring extras");
                trace!("Ignoring extra {hand:?} hand (id {id})");
                continue;
            }

            if let Some(bound) = self.bound_id(hand).filter(|bound| *bound != id) {
                match self.policy {
                    IdChangePolicy::RejectUntilLoss => {
                        warn!(
                            "{hand:?} hand id changed from {bound} to {id}, rejecting until the hand is lost"
                        );
                        report.hand_mut(hand).rejected = true;
                        continue;
                    }
                    IdChangePolicy::RebindImmediately => {
                        debug!("{hand:?} hand id changed to {id}, rebinding");
                        if self.release(registry, hand) {
                            report.hand_mut(hand).lost = true;
                        }
                    }
                }
            }
            seen[hand.slot()] = true;

            let Some(frame) = frame else {
                trace!("{hand:?} hand (id {id}) has no usable frame this tick");
                continue;
            };

            if let Slot::Bound { controller, .. } = &mut self.slots[hand.slot()] {
                registry.hand_updated(controller, &frame);
                report.hand_mut(hand).updated = true;
                present[hand.slot()] = true;
                continue;
            }

            match registry.hand_detected(hand) {
                Ok(mut controller) => {
                    debug!("{hand:?} hand detected (id {id})");
                    registry.hand_updated(&mut controller, &frame);
                    self.slots[hand.slot()] = Slot::Bound { id, controller };
                    report.hand_mut(hand).detected = true;
                    present[hand.slot()] = true;
                }
                Err(e) => {
                    error!("Failed to create controller for {hand:?} hand: {e}");
                    report.hand_mut(hand).failed = true;
                }
            }
        }

        for hand in Hand::ALL {
            if !present[hand.slot()] && self.release(registry, hand) {
                report.hand_mut(hand).lost = true;
            }
        }

        report
    }

    /// Releases both slots, e.g. when tracking stops.
    pub fn release_all<R>(&mut self, registry: &mut R)
    where
        R: ControllerRegistry<Controller = C>,
    {
        for hand in Hand::ALL {
            self.release(registry, hand);
        }
    }

    /// Returns whether the slot was bound.
    fn release<R>(&mut self, registry: &mut R, hand: Hand) -> bool
    where
        R: ControllerRegistry<Controller = C>,
    {
        match std::mem::replace(&mut self.slots[hand.slot()], Slot::Unbound) {
            Slot::Bound { id, controller } => {
                debug!("{hand:?} hand lost (id {id})");
                registry.hand_lost(hand, controller);
                true
            }
            Slot::Unbound => false,
        }
    }
}
