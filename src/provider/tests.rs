use super::*;
use crate::lifecycle::tests::{RecordingRegistry, RegistryEvent::*};
use crate::lifecycle::IdChangePolicy;
use fakeleap::{FakeTrackingSource, HandBuilder, SERIAL};
use glam::Vec3;

struct Fixture {
    source: FakeTrackingSource,
    provider: HandTrackingProvider<FakeTrackingSource, RecordingRegistry>,
    anchor: Pose,
}

impl Fixture {
    fn new(profile: ProviderProfile) -> Self {
        Self::with_source(profile, FakeTrackingSource::new())
    }

    fn with_source(profile: ProviderProfile, source: FakeTrackingSource) -> Self {
        let mut provider =
            HandTrackingProvider::new(profile, source.clone(), RecordingRegistry::default());
        provider.start();
        Self {
            source,
            provider,
            anchor: Pose::IDENTITY,
        }
    }

    fn update(&mut self) -> ObserveReport {
        self.provider.update(&self.anchor)
    }

    fn fixed_update(&mut self) -> ObserveReport {
        self.provider.fixed_update(&self.anchor)
    }

    fn events(&mut self) -> Vec<crate::lifecycle::tests::RegistryEvent> {
        self.provider.registry_mut().take_events()
    }

    #[track_caller]
    fn last_timestamp(&self, hand: Hand) -> i64 {
        self.provider
            .tracker()
            .controller(hand)
            .and_then(|c| c.last_timestamp)
            .expect("hand should be tracked")
    }
}

fn profile_with(f: impl FnOnce(&mut ProviderProfile)) -> ProviderProfile {
    let mut profile = ProviderProfile::default();
    f(&mut profile);
    profile
}

#[test]
fn desktop_mode_applies_default_policy() {
    let f = Fixture::new(ProviderProfile::default());
    assert!(f.source.has_policy(PolicyFlag::Default));
    assert!(!f.source.has_policy(PolicyFlag::OptimizeHmd));
}

#[test]
fn headset_policy_is_cleared_on_stop() {
    let mut f = Fixture::new(profile_with(|p| {
        p.operation_mode = OperationMode::HeadsetMounted
    }));
    assert!(f.source.has_policy(PolicyFlag::OptimizeHmd));

    f.provider.stop();
    assert!(!f.source.has_policy(PolicyFlag::OptimizeHmd));
    assert!(!f.source.is_connected());
}

#[test]
fn policy_waits_for_connection() {
    let mut f = Fixture::with_source(
        profile_with(|p| p.operation_mode = OperationMode::HeadsetMounted),
        FakeTrackingSource::unavailable(),
    );
    assert!(!f.source.has_policy(PolicyFlag::OptimizeHmd));
    f.update();
    assert!(!f.source.has_policy(PolicyFlag::OptimizeHmd));

    f.source.set_service_available(true);
    f.update();
    assert!(f.source.has_policy(PolicyFlag::OptimizeHmd));
}

#[test]
fn start_is_idempotent() {
    let mut f = Fixture::new(ProviderProfile::default());
    assert!(f.provider.is_started());
    f.provider.start();
    f.update();
    assert_eq!(f.source.frame_requests(), 1);
}

#[test]
fn hands_are_detected_and_lost() {
    let mut f = Fixture::new(ProviderProfile::default());
    let left = f.source.add_hand(HandBuilder::left());
    let right = f.source.add_hand(HandBuilder::right());

    let report = f.update();
    assert!(report.hand(Hand::Left).detected);
    assert!(report.hand(Hand::Right).detected);
    assert_eq!(
        f.provider.tracker().bound_id(Hand::Left),
        Some(f.source.hand_id(left))
    );
    assert_eq!(
        f.provider.tracker().bound_id(Hand::Right),
        Some(f.source.hand_id(right))
    );
    f.events();

    f.source.remove_hand(left);
    let report = f.update();
    assert!(report.hand(Hand::Left).lost);
    assert!(report.hand(Hand::Right).updated);
    assert_eq!(f.events(), [Updated(Hand::Right, 2), Lost(Hand::Left, 1)]);

    f.source.clear_hands();
    for _ in 0..3 {
        f.update();
    }
    assert_eq!(f.events(), [Lost(Hand::Right, 2)]);
    assert_eq!(f.provider.registry().live_controllers(), 0);
}

#[test]
fn changed_id_drops_the_hand_for_a_tick() {
    let mut f = Fixture::new(ProviderProfile::default());
    let hand = f.source.add_hand(HandBuilder::right().with_id(5));
    f.update();
    f.events();

    f.source.update_hand(hand, |h| h.id = Some(7));
    let report = f.update();
    assert!(report.hand(Hand::Right).rejected);
    assert_eq!(f.events(), [Lost(Hand::Right, 1)]);

    let report = f.update();
    assert!(report.hand(Hand::Right).detected);
    assert_eq!(f.provider.tracker().bound_id(Hand::Right), Some(7));
}

#[test]
fn rebind_policy_comes_from_profile() {
    let mut f = Fixture::new(profile_with(|p| {
        p.id_change_policy = IdChangePolicy::RebindImmediately
    }));
    let hand = f.source.add_hand(HandBuilder::right().with_id(5));
    f.update();
    f.events();

    f.source.update_hand(hand, |h| h.id = Some(7));
    f.update();
    assert_eq!(
        f.events(),
        [
            Lost(Hand::Right, 1),
            Detected(Hand::Right, 2),
            Updated(Hand::Right, 2)
        ]
    );
}

#[test]
fn anchor_moves_the_root_pose() {
    let mut f = Fixture::new(profile_with(|p| p.leap_controller_offset = [0.0; 3]));
    f.source
        .add_hand(HandBuilder::right().at(Vec3::new(0.0, 200.0, 0.0)));

    f.update();
    let root = |f: &Fixture| {
        f.provider
            .tracker()
            .controller(Hand::Right)
            .and_then(|c| c.last_root)
            .unwrap()
    };
    assert!(root(&f).position.abs_diff_eq(Vec3::new(0.0, 0.2, 0.0), 1e-5));

    f.anchor = Pose::from_translation(Vec3::new(1.0, 0.0, -2.0));
    f.update();
    assert!(root(&f).position.abs_diff_eq(Vec3::new(1.0, 0.2, -2.0), 1e-5));
}

#[test]
fn reconnection_attempts_are_capped() {
    let mut f = Fixture::with_source(
        profile_with(|p| {
            p.max_reconnection_attempts = 5;
            p.reconnection_interval = 180;
        }),
        FakeTrackingSource::unavailable(),
    );

    for _ in 0..180 * 20 {
        let report = f.update();
        assert_eq!(report, ObserveReport::default());
    }
    assert_eq!(f.source.reconnect_attempts(), 5);
    assert!(f.provider.tracking_unavailable());

    f.provider.reset_connection();
    assert!(!f.provider.tracking_unavailable());
    for _ in 0..181 {
        f.update();
    }
    assert_eq!(f.source.reconnect_attempts(), 6);
}

#[test]
fn physics_steps_do_not_count_towards_reconnection() {
    let mut f = Fixture::with_source(
        profile_with(|p| p.reconnection_interval = 1),
        FakeTrackingSource::unavailable(),
    );
    for _ in 0..10 {
        f.fixed_update();
    }
    assert_eq!(f.source.reconnect_attempts(), 0);
    f.update();
    f.update();
    assert_eq!(f.source.reconnect_attempts(), 1);
}

#[test]
fn tracking_resumes_after_service_returns() {
    let mut f = Fixture::new(profile_with(|p| p.reconnection_interval = 2));
    f.source.add_hand(HandBuilder::left());
    assert!(f.update().hand(Hand::Left).detected);
    f.events();

    f.source.set_service_available(false);
    let report = f.update();
    assert!(report.hand(Hand::Left).lost);
    assert_eq!(f.events(), [Lost(Hand::Left, 1)]);
    assert_eq!(f.source.frame_requests(), 1);

    for _ in 0..3 {
        f.update();
    }
    assert_eq!(f.source.reconnect_attempts(), 1);

    f.source.set_service_available(true);
    assert!(f.update().hand(Hand::Left).detected);
    assert!(!f.provider.tracking_unavailable());
}

#[test]
fn device_failure_does_not_interrupt_tracking() {
    let mut f = Fixture::new(ProviderProfile::default());
    f.source.add_hand(HandBuilder::left());
    f.source.push_event(DeviceEvent::Failure {
        serial: SERIAL.to_owned(),
        reason: "bad calibration".to_owned(),
    });
    assert!(f.update().is_tracked(Hand::Left));
}

#[test]
fn update_frame_is_reused_for_physics() {
    let mut f = Fixture::new(profile_with(|p| {
        p.frame_optimization_mode = FrameOptimizationMode::ReuseUpdateForPhysics
    }));
    f.source.add_hand(HandBuilder::left());

    f.update();
    let timestamp = f.last_timestamp(Hand::Left);
    assert!(f.fixed_update().hand(Hand::Left).updated);
    assert!(f.fixed_update().hand(Hand::Left).updated);
    assert_eq!(f.source.frame_requests(), 1);
    assert_eq!(f.last_timestamp(Hand::Left), timestamp);

    f.update();
    assert_eq!(f.source.frame_requests(), 2);
    assert!(f.last_timestamp(Hand::Left) > timestamp);
}

#[test]
fn physics_frame_is_reused_for_update() {
    let mut f = Fixture::new(profile_with(|p| {
        p.frame_optimization_mode = FrameOptimizationMode::ReusePhysicsForUpdate
    }));
    f.source.add_hand(HandBuilder::right());

    // Nothing to reuse yet.
    f.update();
    assert_eq!(f.source.frame_requests(), 1);

    f.fixed_update();
    let timestamp = f.last_timestamp(Hand::Right);
    f.update();
    assert_eq!(f.source.frame_requests(), 2);
    assert_eq!(f.last_timestamp(Hand::Right), timestamp);
}

#[test]
fn update_frame_is_not_replayed_after_disconnect() {
    let mut f = Fixture::new(profile_with(|p| {
        p.frame_optimization_mode = FrameOptimizationMode::ReuseUpdateForPhysics
    }));
    f.source.add_hand(HandBuilder::left());
    assert!(f.update().hand(Hand::Left).detected);

    f.source.set_service_available(false);
    f.source.clear_hands();
    assert!(f.update().hand(Hand::Left).lost);

    f.source.set_service_available(true);
    let report = f.fixed_update();
    assert!(!report.hand(Hand::Left).detected);
    assert!(!report.is_tracked(Hand::Left));
    assert_eq!(f.source.frame_requests(), 2);
    assert_eq!(
        f.events(),
        [
            Detected(Hand::Left, 1),
            Updated(Hand::Left, 1),
            Lost(Hand::Left, 1)
        ]
    );
}

#[test]
fn physics_frame_is_not_replayed_after_disconnect() {
    let mut f = Fixture::new(profile_with(|p| {
        p.frame_optimization_mode = FrameOptimizationMode::ReusePhysicsForUpdate
    }));
    f.source.add_hand(HandBuilder::right());
    assert!(f.fixed_update().hand(Hand::Right).detected);

    f.source.set_service_available(false);
    f.source.clear_hands();
    assert!(f.fixed_update().hand(Hand::Right).lost);

    f.source.set_service_available(true);
    let report = f.update();
    assert!(!report.hand(Hand::Right).detected);
    assert!(!report.is_tracked(Hand::Right));
    assert_eq!(f.source.frame_requests(), 2);
}

#[test]
fn each_pass_samples_without_optimization() {
    let mut f = Fixture::new(ProviderProfile::default());
    f.source.add_hand(HandBuilder::right());

    f.update();
    let timestamp = f.last_timestamp(Hand::Right);
    f.fixed_update();
    assert_eq!(f.source.frame_requests(), 2);
    assert!(f.last_timestamp(Hand::Right) > timestamp);
}

#[test]
fn stop_releases_controllers() {
    let mut f = Fixture::new(ProviderProfile::default());
    f.source.add_hand(HandBuilder::left());
    f.source.add_hand(HandBuilder::right());
    f.update();
    f.events();

    f.provider.stop();
    assert_eq!(f.events(), [Lost(Hand::Left, 1), Lost(Hand::Right, 2)]);
    assert!(!f.provider.is_started());

    assert_eq!(f.update(), ObserveReport::default());
    assert!(f.events().is_empty());
    assert_eq!(f.source.frame_requests(), 1);

    f.provider.stop();
    assert!(f.events().is_empty());
}

#[test]
fn unconvertible_hand_is_not_tracked() {
    let mut f = Fixture::new(ProviderProfile::default());
    f.source
        .add_hand(HandBuilder::left().at(Vec3::new(f32::NAN, 0.0, 0.0)));
    f.source.add_hand(HandBuilder::right());

    let report = f.update();
    assert!(!report.is_tracked(Hand::Left));
    assert!(report.is_tracked(Hand::Right));
    assert_eq!(f.provider.tracker().bound_id(Hand::Left), None);
}
