#[cfg(test)]
mod tests;

use crate::connection::{ConnectionMonitor, ConnectionStatus};
use crate::converter::{HandPoseConverter, ReferenceFrame};
use crate::lifecycle::{ControllerRegistry, HandLifecycleTracker, Observation, ObserveReport};
use crate::pose::Pose;
use crate::profile::{FrameOptimizationMode, OperationMode, ProviderProfile};
use crate::skeleton::Hand;
use crate::{tracy_span, warn_once};
use leap::{DeviceEvent, PolicyFlag, RawFrame, TrackingSource};
use log::{debug, error, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pass {
    Update,
    Physics,
}

/// Drives a [`TrackingSource`] once per frame and keeps a [`ControllerRegistry`] in sync
/// with the hands it reports.
pub struct HandTrackingProvider<S, R: ControllerRegistry> {
    profile: ProviderProfile,
    source: S,
    registry: R,
    converter: HandPoseConverter,
    tracker: HandLifecycleTracker<R::Controller>,
    monitor: ConnectionMonitor,
    started: bool,
    /// Set until the tracking policy has been applied to a connected device.
    policy_pending: bool,
    unavailable_reported: bool,
    update_frame: Option<RawFrame>,
    physics_frame: Option<RawFrame>,
}

impl<S: TrackingSource, R: ControllerRegistry> HandTrackingProvider<S, R> {
    /// The profile is assumed to be validated already, see [`ProviderProfile::validate`].
    pub fn new(profile: ProviderProfile, source: S, registry: R) -> Self {
        debug!("Creating hand tracking provider: {profile:?}");
        Self {
            converter: HandPoseConverter::new(
                profile.device_offset(),
                profile.converter_options(),
            ),
            tracker: HandLifecycleTracker::new(profile.id_change_policy),
            monitor: ConnectionMonitor::new(
                profile.max_reconnection_attempts,
                profile.reconnection_interval,
            ),
            profile,
            source,
            registry,
            started: false,
            policy_pending: false,
            unavailable_reported: false,
            update_frame: None,
            physics_frame: None,
        }
    }

    pub fn start(&mut self) {
        if self.started {
            return;
        }
        info!("Starting hand tracking ({:?})", self.profile.operation_mode);
        self.started = true;
        self.policy_pending = true;
        self.source.connect();
        if self.source.is_connected() {
            self.apply_policy();
        } else {
            debug!("Tracking device not connected yet, deferring policy");
        }
    }

    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        info!("Stopping hand tracking");
        if self.source.is_connected() {
            self.source.clear_policy(PolicyFlag::OptimizeHmd);
        }
        self.source.disconnect();
        self.tracker.release_all(&mut self.registry);
        self.drop_cached_frames();
        self.started = false;
        self.policy_pending = false;
    }

    /// Per rendered frame. `anchor` is the camera pose the sensor is mounted relative to.
    pub fn update(&mut self, anchor: &Pose) -> ObserveReport {
        self.tick(Pass::Update, anchor)
    }

    /// Per physics step.
    pub fn fixed_update(&mut self, anchor: &Pose) -> ObserveReport {
        self.tick(Pass::Physics, anchor)
    }

    /// Gives up any exhausted reconnection state and starts counting attempts again.
    pub fn reset_connection(&mut self) {
        debug!("Resetting connection monitor");
        self.monitor.reset();
        self.unavailable_reported = false;
    }

    pub fn tracking_unavailable(&self) -> bool {
        self.monitor.is_exhausted()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn tracker(&self) -> &HandLifecycleTracker<R::Controller> {
        &self.tracker
    }

    fn tick(&mut self, pass: Pass, anchor: &Pose) -> ObserveReport {
        tracy_span!("HandTrackingProvider::tick");
        if !self.started {
            return ObserveReport::default();
        }

        self.poll_events();
        if !self.check_connection(pass) {
            self.drop_cached_frames();
            return self.tracker.observe(&mut self.registry, []);
        }

        let slot = self.frame_slot(pass);
        let frame = if slot == pass {
            self.source.frame()
        } else {
            trace!("Reusing {slot:?} frame for {pass:?}");
            self.cache_mut(slot).take()
        };

        let report = match &frame {
            Some(frame) => self.frame_ready(frame, anchor),
            None => {
                trace!("No frame available for {pass:?}");
                self.drop_cached_frames();
                self.tracker.observe(&mut self.registry, [])
            }
        };
        *self.cache_mut(slot) = frame;
        report
    }

    /// Frames from before a gap in the service must never be replayed by the other pass.
    fn drop_cached_frames(&mut self) {
        self.update_frame = None;
        self.physics_frame = None;
    }

    /// Which pass's frame this pass should use.
    fn frame_slot(&self, pass: Pass) -> Pass {
        match (self.profile.frame_optimization_mode, pass) {
            (FrameOptimizationMode::ReuseUpdateForPhysics, Pass::Physics)
                if self.update_frame.is_some() =>
            {
                Pass::Update
            }
            (FrameOptimizationMode::ReusePhysicsForUpdate, Pass::Update)
                if self.physics_frame.is_some() =>
            {
                Pass::Physics
            }
            _ => pass,
        }
    }

    fn cache_mut(&mut self, pass: Pass) -> &mut Option<RawFrame> {
        match pass {
            Pass::Update => &mut self.update_frame,
            Pass::Physics => &mut self.physics_frame,
        }
    }

    fn poll_events(&mut self) {
        while let Some(event) = self.source.poll_event() {
            match event {
                DeviceEvent::Connected { serial } => {
                    info!("Tracking device {serial} connected");
                    if self.policy_pending {
                        self.apply_policy();
                    }
                }
                DeviceEvent::Disconnected { serial } => {
                    warn!("Tracking device {serial} disconnected");
                }
                DeviceEvent::Failure { serial, reason } => {
                    error!("Tracking device {serial} failed: {reason}");
                }
            }
        }
    }

    fn apply_policy(&mut self) {
        let flag = match self.profile.operation_mode {
            OperationMode::Desktop => PolicyFlag::Default,
            OperationMode::HeadsetMounted => PolicyFlag::OptimizeHmd,
        };
        debug!("Applying tracking policy {flag:?}");
        self.source.set_policy(flag);
        self.policy_pending = false;
    }

    /// Only the update pass paces reconnection; physics steps just skip while disconnected.
    fn check_connection(&mut self, pass: Pass) -> bool {
        let connected = self.source.is_connected();
        if pass == Pass::Physics {
            return connected;
        }

        match self.monitor.check(connected) {
            ConnectionStatus::Connected => {
                self.unavailable_reported = false;
                true
            }
            ConnectionStatus::Waiting => false,
            ConnectionStatus::Reconnect { attempt } => {
                warn!(
                    "Tracking service not connected, reconnection attempt {attempt}/{}",
                    self.profile.max_reconnection_attempts
                );
                self.source.reconnect();
                false
            }
            ConnectionStatus::Unavailable => {
                if !std::mem::replace(&mut self.unavailable_reported, true) {
                    error!(
                        "Tracking service unavailable after {} reconnection attempts",
                        self.profile.max_reconnection_attempts
                    );
                }
                false
            }
        }
    }

    fn frame_ready(&mut self, frame: &RawFrame, anchor: &Pose) -> ObserveReport {
        let reference = ReferenceFrame {
            anchor: *anchor,
            joints: self.profile.joint_space,
        };

        let observations: Vec<Observation> = frame
            .hands
            .iter()
            .map(|sample| {
                let hand = Hand::from(sample.chirality);
                // Samples the tracker is going to reject aren't worth converting.
                let hand_frame = if self.tracker.accepts(hand, sample.id) {
                    match self.converter.convert(sample, frame.timestamp, &reference) {
                        Ok(hand_frame) => Some(hand_frame),
                        Err(e) => {
                            warn_once!("Dropping hand samples that fail to convert");
                            debug!("{hand:?} hand (id {}) failed to convert: {e}", sample.id);
                            None
                        }
                    }
                } else {
                    None
                };
                Observation {
                    hand,
                    id: sample.id,
                    frame: hand_frame,
                }
            })
            .collect();

        self.tracker.observe(&mut self.registry, observations)
    }
}
