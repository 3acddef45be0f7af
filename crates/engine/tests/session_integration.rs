//! End-to-end session scenarios against the virtual backend.
//!
//! These tests drive the full per-frame callback sequence the rendering
//! host would: update, per-eye pre/post render, end-of-frame, and the
//! render-thread finish signal, with the hardware clock advanced by hand.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use glam::{Quat, Vec3};
use openvisor_engine::prelude::*;

const MS: u64 = 1_000_000;

struct Harness {
    session: Session,
    backend: Arc<VirtualTrackingBackend>,
    metrics: Arc<VirtualPresentMetrics>,
    clock: ManualClock,
}

fn harness(config: SessionConfig) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let backend = Arc::new(VirtualTrackingBackend::new());
    let metrics = Arc::new(VirtualPresentMetrics::new());
    let clock = backend.clock();
    let session = Session::create(
        config,
        Arc::clone(&backend) as Arc<dyn TrackingBackend>,
        Arc::clone(&metrics) as Arc<dyn PresentMetricsSource>,
    );
    Harness {
        session,
        backend,
        metrics,
        clock,
    }
}

impl Harness {
    /// Drive one frame through every hook, with the render-thread finish
    /// signal arriving from an actual second thread.
    fn run_frame(&mut self, frame_idx: u64, base_ns: u64) {
        let head = Pose::new(
            Vec3::new(0.0, 1.6, -0.01 * frame_idx as f32),
            Quat::from_rotation_y(0.01 * frame_idx as f32),
        );
        // The backend predicts the pose for the upcoming present slot.
        self.backend
            .set_pose(head, base_ns + 20 * MS, LostTrackingReason::None);

        self.clock.set(base_ns);
        self.session.on_update(frame_idx);

        self.clock.set(base_ns + MS);
        self.session.on_camera_pre_render(Eye::Left, frame_idx);
        self.clock.set(base_ns + 2 * MS);
        self.session.on_camera_pre_render(Eye::Right, frame_idx);
        self.clock.set(base_ns + 3 * MS);
        self.session.on_camera_post_render(Eye::Left, frame_idx);
        self.clock.set(base_ns + 4 * MS);
        self.session.on_camera_post_render(Eye::Right, frame_idx);
        self.clock.set(base_ns + 5 * MS);
        self.session.on_end_of_frame(frame_idx);

        let handle = self.session.frame_finish_handle();
        let finish_ns = base_ns + 6 * MS;
        let render_thread =
            std::thread::spawn(move || handle.frame_finished(frame_idx, finish_ns));
        assert!(render_thread.join().unwrap_or(false), "finish queue full");
    }

    fn settle_mode_change(&mut self, frame_idx: u64) {
        for _ in 0..500 {
            self.session.on_update(frame_idx);
            if !self.session.is_mode_changing() {
                return;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("mode change did not settle");
    }
}

#[test]
fn full_frame_loop_aggregates_present_metrics() {
    let mut config = SessionConfig::default();
    config.metrics_window_ns = 100 * MS;
    let mut h = harness(config);
    h.metrics.set_present_count(1);
    h.session.start().expect("start");

    // 30 frames at 10 ms cadence: three full 100 ms windows.
    for i in 0..30u64 {
        h.run_frame(i, i * 10 * MS);
    }

    let snapshot = h.session.metrics_snapshot();
    assert!(snapshot.frame_count > 0, "at least one window saved");
    // update at t, present predicted at t+20ms.
    assert_eq!(snapshot.avg_update_to_present_ns, 20 * MS);
    assert_eq!(snapshot.avg_pre_to_present_ns, 19 * MS);
    assert_eq!(snapshot.avg_post_to_present_ns, 16 * MS);
    assert!((snapshot.avg_present_count - 1.0).abs() < f32::EPSILON);
    assert!(snapshot.frame_count_all >= snapshot.frame_count);

    let counters = h.session.counters();
    assert_eq!(counters.frames_dropped_invalid, 0);
    assert!(counters.frames_aggregated >= 25);
    assert_eq!(counters.pose_updates, 30);
}

#[test]
fn mode_change_emits_events_and_recaches_world() {
    let mut h = harness(SessionConfig::default());
    h.session.start().expect("start");
    let mut rx = h.session.events().subscribe();

    h.run_frame(0, 0);

    let settled = Arc::new(Mutex::new(None));
    let writer = Arc::clone(&settled);
    let dispatched = h.session.request_3dof(Some(Box::new(move |result| {
        *writer.lock().expect("callback lock") = Some(result);
    })));
    assert!(dispatched);
    h.settle_mode_change(1);

    let result = settled
        .lock()
        .expect("callback lock")
        .expect("callback invoked");
    assert!(result.success);
    assert_eq!(result.mode, TrackingMode::ThreeDof);
    assert_eq!(h.session.tracking_mode(), TrackingMode::ThreeDof);
    assert_eq!(h.backend.switch_history(), vec![TrackingMode::ThreeDof]);

    let mut saw_changing = false;
    let mut saw_changed = false;
    let mut saw_world_reset = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::ModeChanging { from, to } => {
                assert_eq!(from, TrackingMode::SixDof);
                assert_eq!(to, TrackingMode::ThreeDof);
                saw_changing = true;
            }
            SessionEvent::ModeChanged(result) => {
                assert!(result.success);
                saw_changed = true;
            }
            SessionEvent::WorldPoseReset => saw_world_reset = true,
            _ => {}
        }
    }
    assert!(saw_changing && saw_changed && saw_world_reset);
    assert!(h.session.world_matrix() != glam::Mat4::IDENTITY);
}

#[test]
fn lost_tracking_round_trip_emits_edges() {
    let mut h = harness(SessionConfig::default());
    h.session.start().expect("start");
    let mut rx = h.session.events().subscribe();

    h.run_frame(0, 0);
    h.backend.set_pose(
        Pose::IDENTITY,
        10 * MS,
        LostTrackingReason::InsufficientFeatures,
    );
    h.clock.set(10 * MS);
    h.session.on_update(1);

    h.backend
        .set_pose(Pose::IDENTITY, 20 * MS, LostTrackingReason::None);
    h.clock.set(20 * MS);
    h.session.on_update(2);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.contains(&SessionEvent::LostTracking(
        LostTrackingReason::InsufficientFeatures
    )));
    assert!(events.contains(&SessionEvent::PoseReady));
}

#[test]
fn pause_resume_restarts_metrics_and_destroy_is_terminal() {
    let mut config = SessionConfig::default();
    config.metrics_window_ns = 100 * MS;
    let mut h = harness(config);
    h.session.start().expect("start");

    for i in 0..15u64 {
        h.run_frame(i, i * 10 * MS);
    }
    assert!(h.session.metrics_snapshot().frame_count_all > 0);

    h.session.pause().expect("pause");
    assert!(h.session.head_pose().is_err());

    h.clock.set(300 * MS);
    h.session.resume().expect("resume");
    // Whole-session sums restart on resume.
    assert_eq!(h.session.metrics_snapshot().frame_count_all, 0);

    h.session.destroy().expect("destroy");
    assert!(h.session.head_pose().is_err());
    assert!(h.session.start().is_err());
}
