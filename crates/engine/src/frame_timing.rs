//! Frame-present timing and rolling metrics.
//!
//! Every engine frame leaves a trail of hardware timestamps across up to
//! seven hook sites (update, per-eye pre/post render, end-of-frame, and the
//! render-thread end-of-frame event). A [`FrameStats`] record collects them,
//! is marked finished by the render-thread signal, and is then folded into
//! [`FrameMetrics`] and recycled through a free list so steady-state frames
//! allocate nothing.
//!
//! The render-thread signal is the single cross-thread element here: a
//! bounded lock-free queue of finished frame indices pushed from the render
//! thread and drained on the update thread. Every other field of a record is
//! touched from the update thread only.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use openvisor_atomic::{AtomicCounters, StreamingStats};
use tracing::{debug, trace};
use visor_schemas::Eye;

use crate::ports::PresentMetricsSource;

/// Default rolling-window duration: one second.
pub const DEFAULT_METRICS_WINDOW_NS: u64 = 1_000_000_000;

/// Default minimum interval between native counter polls: 500 ms, which
/// bounds the poll rate to the 2 Hz the interface contract allows.
pub const DEFAULT_NATIVE_POLL_INTERVAL_NS: u64 = 500_000_000;

/// Default capacity of the render-thread finish queue.
pub const DEFAULT_FINISH_QUEUE_CAPACITY: usize = 64;

/// Timing record for a single engine frame.
///
/// Fields are independent and may be filled in any hook order within the
/// frame; only `finished` carries an ordering obligation (`present_time_ns`
/// is read after the render-thread end-of-frame fires).
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    /// Engine frame counter this record belongs to.
    pub frame_idx: u64,
    /// Hardware time at the update hook.
    pub update_time_ns: u64,
    /// Hardware time at left-eye pre-render.
    pub left_pre_render_time_ns: u64,
    /// Hardware time at left-eye post-render.
    pub left_post_render_time_ns: u64,
    /// Hardware time at right-eye pre-render.
    pub right_pre_render_time_ns: u64,
    /// Hardware time at right-eye post-render.
    pub right_post_render_time_ns: u64,
    /// Hardware time at the main-thread end-of-frame hook.
    pub end_of_frame_time_ns: u64,
    /// Hardware time when the render thread finished the frame.
    pub render_thread_end_time_ns: u64,
    /// Predicted display time of the frame (the pose timestamp captured at
    /// first pre-render).
    pub present_time_ns: u64,
    /// Set when the render-thread end-of-frame signal has arrived.
    pub finished: bool,
    /// Native: times the current frame was presented.
    pub present_count: u32,
    /// Native: frames shown more than once.
    pub extra_frames: u32,
    /// Native: frames ready ahead of schedule.
    pub early_frames: u32,
    /// Native: frames that missed their display slot.
    pub dropped_frames: u32,
    /// Native: application frame latency in nanoseconds.
    pub latency_ns: u64,
}

impl FrameStats {
    /// Clear the record for reuse under a new frame index.
    pub fn reset(&mut self, frame_idx: u64) {
        *self = Self {
            frame_idx,
            ..Self::default()
        };
    }

    /// Whether this record may be folded into the aggregates.
    ///
    /// The present time must lie strictly after the update and render hooks;
    /// anything else means a missing timestamp or clock rollover and would
    /// corrupt the averages.
    #[must_use]
    pub const fn is_valid_for_aggregation(&self) -> bool {
        self.finished
            && self.present_time_ns > self.update_time_ns
            && self.present_time_ns > self.left_pre_render_time_ns
            && self.present_time_ns > self.right_post_render_time_ns
    }

    /// Copy the per-frame native counters into the record.
    pub fn feed_native(&mut self, native: &dyn PresentMetricsSource) {
        self.present_count = native.frame_present_count();
        self.extra_frames = native.extra_frame_count();
        self.early_frames = native.early_frame_count();
        self.dropped_frames = native.dropped_frame_count();
        self.latency_ns = native.frame_latency_ns();
    }
}

/// Bounded lock-free queue carrying the render-thread end-of-frame signal.
#[derive(Debug)]
pub struct FrameFinishQueue {
    queue: ArrayQueue<(u64, u64)>,
}

impl FrameFinishQueue {
    /// Create a queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Push a finished frame signal. Returns `false` when the queue is full
    /// (the signal is dropped; metrics are best-effort).
    pub fn push(&self, frame_idx: u64, time_ns: u64) -> bool {
        self.queue.push((frame_idx, time_ns)).is_ok()
    }

    /// Pop the oldest pending signal.
    pub fn pop(&self) -> Option<(u64, u64)> {
        self.queue.pop()
    }
}

/// Cloneable render-thread handle onto the finish queue.
///
/// The render-thread end-of-frame callback calls [`frame_finished`] with the
/// frame index it was issued for and the current hardware time. This is the
/// only entry point into the metrics pipeline that may be called off the
/// update thread.
///
/// [`frame_finished`]: FrameFinishHandle::frame_finished
#[derive(Debug, Clone)]
pub struct FrameFinishHandle {
    queue: Arc<FrameFinishQueue>,
}

impl FrameFinishHandle {
    /// Signal that the render thread finished the given frame.
    pub fn frame_finished(&self, frame_idx: u64, time_ns: u64) -> bool {
        self.queue.push(frame_idx, time_ns)
    }
}

/// Minimum-interval gate for native counter polls.
#[derive(Debug, Clone)]
pub struct PollLimiter {
    min_interval_ns: u64,
    last_poll_ns: Option<u64>,
}

impl PollLimiter {
    /// Create a limiter with the given minimum interval.
    #[must_use]
    pub const fn new(min_interval_ns: u64) -> Self {
        Self {
            min_interval_ns,
            last_poll_ns: None,
        }
    }

    /// Returns true when a poll is due at `now_ns`, and records it.
    pub fn should_poll(&mut self, now_ns: u64) -> bool {
        match self.last_poll_ns {
            Some(last) if now_ns.saturating_sub(last) < self.min_interval_ns => false,
            _ => {
                self.last_poll_ns = Some(now_ns);
                true
            }
        }
    }

    /// Restart the interval from `now_ns`.
    pub fn reset(&mut self, now_ns: u64) {
        self.last_poll_ns = Some(now_ns);
    }
}

/// Saved averages for the last full window and the whole session.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameMetricsSnapshot {
    /// Frames folded in the last full window.
    pub frame_count: u64,
    /// Mean update-to-present latency over the last window.
    pub avg_update_to_present_ns: u64,
    /// Mean pre-render-to-present latency over the last window.
    pub avg_pre_to_present_ns: u64,
    /// Mean post-render-to-present latency over the last window.
    pub avg_post_to_present_ns: u64,
    /// Mean per-frame present count over the last window.
    pub avg_present_count: f32,
    /// Mean extra-frame count over the last window.
    pub avg_extra_frames: f32,
    /// Early frames observed in the last window.
    pub sum_early_frames: u32,
    /// Dropped frames observed in the last window.
    pub sum_dropped_frames: u32,
    /// Mean native frame latency over the last window.
    pub avg_latency_ns: u64,
    /// Native presentation rate at the end of the last window.
    pub present_fps: u32,

    /// Frames folded since the session started (or metrics were reset).
    pub frame_count_all: u64,
    /// Whole-session mean update-to-present latency.
    pub avg_update_to_present_all_ns: u64,
    /// Whole-session mean pre-render-to-present latency.
    pub avg_pre_to_present_all_ns: u64,
    /// Whole-session mean post-render-to-present latency.
    pub avg_post_to_present_all_ns: u64,
    /// Whole-session mean per-frame present count.
    pub avg_present_count_all: f32,
    /// Whole-session mean extra-frame count.
    pub avg_extra_frames_all: f32,
    /// Whole-session early frames.
    pub sum_early_frames_all: u32,
    /// Whole-session dropped frames.
    pub sum_dropped_frames_all: u32,
    /// Whole-session mean native frame latency.
    pub avg_latency_all_ns: u64,
}

/// Result of feeding one record into the rolling metrics.
#[derive(Debug, Clone, Copy)]
pub struct FeedResult {
    /// The record passed validation and was folded into the sums.
    pub folded: bool,
    /// The window elapsed on this feed and the averages were saved.
    pub window_rolled: bool,
}

/// Rolling frame metrics over a sliding window plus whole-session sums.
///
/// Time is measured on the hardware clock that stamps the frame records, so
/// window rollover is exact with respect to the data being aggregated.
#[derive(Debug)]
pub struct FrameMetrics {
    window_ns: u64,
    window_start_ns: u64,
    native_poll: PollLimiter,

    frame_count: u64,
    update_to_present: StreamingStats,
    pre_to_present: StreamingStats,
    post_to_present: StreamingStats,
    latency: StreamingStats,
    present_count_sum: u64,
    extra_frame_sum: u64,
    early_frame_sum: u32,
    dropped_frame_sum: u32,

    frame_count_all: u64,
    update_to_present_all: StreamingStats,
    pre_to_present_all: StreamingStats,
    post_to_present_all: StreamingStats,
    latency_all: StreamingStats,
    present_count_sum_all: u64,
    extra_frame_sum_all: u64,
    early_frame_sum_all: u32,
    dropped_frame_sum_all: u32,

    snapshot: FrameMetricsSnapshot,
}

impl FrameMetrics {
    /// Create rolling metrics with the given window and native poll interval.
    #[must_use]
    pub fn new(window_ns: u64, native_poll_interval_ns: u64) -> Self {
        Self {
            window_ns: window_ns.max(1),
            window_start_ns: 0,
            native_poll: PollLimiter::new(native_poll_interval_ns),
            frame_count: 0,
            update_to_present: StreamingStats::new(),
            pre_to_present: StreamingStats::new(),
            post_to_present: StreamingStats::new(),
            latency: StreamingStats::new(),
            present_count_sum: 0,
            extra_frame_sum: 0,
            early_frame_sum: 0,
            dropped_frame_sum: 0,
            frame_count_all: 0,
            update_to_present_all: StreamingStats::new(),
            pre_to_present_all: StreamingStats::new(),
            post_to_present_all: StreamingStats::new(),
            latency_all: StreamingStats::new(),
            present_count_sum_all: 0,
            extra_frame_sum_all: 0,
            early_frame_sum_all: 0,
            dropped_frame_sum_all: 0,
            snapshot: FrameMetricsSnapshot::default(),
        }
    }

    /// The last saved averages.
    #[must_use]
    pub const fn snapshot(&self) -> FrameMetricsSnapshot {
        self.snapshot
    }

    /// Frames folded into the current (unfinished) window.
    #[must_use]
    pub const fn pending_frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Fold one finished record into the sums and advance the window.
    ///
    /// Invalid records (missing timestamps, present time not after the
    /// update/render hooks) are skipped silently; the window still advances
    /// so averages keep their cadence on a quiet or broken frame source.
    pub fn feed(
        &mut self,
        stats: &FrameStats,
        now_ns: u64,
        native: &dyn PresentMetricsSource,
    ) -> FeedResult {
        let folded = stats.is_valid_for_aggregation();
        if folded {
            self.frame_count += 1;
            self.frame_count_all += 1;

            let update_to_present = stats.present_time_ns - stats.update_time_ns;
            self.update_to_present.record(update_to_present);
            self.update_to_present_all.record(update_to_present);

            let pre_to_present = stats.present_time_ns - stats.left_pre_render_time_ns;
            self.pre_to_present.record(pre_to_present);
            self.pre_to_present_all.record(pre_to_present);

            let post_to_present = stats.present_time_ns - stats.right_post_render_time_ns;
            self.post_to_present.record(post_to_present);
            self.post_to_present_all.record(post_to_present);

            self.present_count_sum += u64::from(stats.present_count);
            self.present_count_sum_all += u64::from(stats.present_count);
            self.extra_frame_sum += u64::from(stats.extra_frames);
            self.extra_frame_sum_all += u64::from(stats.extra_frames);

            if self.native_poll.should_poll(now_ns) {
                let early = native.early_frame_count();
                self.early_frame_sum = self.early_frame_sum.saturating_add(early);
                self.early_frame_sum_all = self.early_frame_sum_all.saturating_add(early);

                let dropped = native.dropped_frame_count();
                self.dropped_frame_sum = self.dropped_frame_sum.saturating_add(dropped);
                self.dropped_frame_sum_all = self.dropped_frame_sum_all.saturating_add(dropped);
            }

            self.latency.record(stats.latency_ns);
            self.latency_all.record(stats.latency_ns);

            trace!(
                frame_idx = stats.frame_idx,
                update_to_present, pre_to_present, post_to_present, "frame folded"
            );
        }

        let window_rolled = now_ns.saturating_sub(self.window_start_ns) >= self.window_ns;
        if window_rolled {
            self.save_window(native);
            self.reset_window(now_ns);
        }

        FeedResult {
            folded,
            window_rolled,
        }
    }

    fn save_window(&mut self, native: &dyn PresentMetricsSource) {
        if self.frame_count == 0 || self.frame_count_all == 0 {
            return;
        }

        self.snapshot = FrameMetricsSnapshot {
            frame_count: self.frame_count,
            avg_update_to_present_ns: self.update_to_present.mean(),
            avg_pre_to_present_ns: self.pre_to_present.mean(),
            avg_post_to_present_ns: self.post_to_present.mean(),
            avg_present_count: ratio(self.present_count_sum, self.frame_count),
            avg_extra_frames: ratio(self.extra_frame_sum, self.frame_count),
            sum_early_frames: self.early_frame_sum,
            sum_dropped_frames: self.dropped_frame_sum,
            avg_latency_ns: self.latency.mean(),
            present_fps: native.present_fps(),

            frame_count_all: self.frame_count_all,
            avg_update_to_present_all_ns: self.update_to_present_all.mean(),
            avg_pre_to_present_all_ns: self.pre_to_present_all.mean(),
            avg_post_to_present_all_ns: self.post_to_present_all.mean(),
            avg_present_count_all: ratio(self.present_count_sum_all, self.frame_count_all),
            avg_extra_frames_all: ratio(self.extra_frame_sum_all, self.frame_count_all),
            sum_early_frames_all: self.early_frame_sum_all,
            sum_dropped_frames_all: self.dropped_frame_sum_all,
            avg_latency_all_ns: self.latency_all.mean(),
        };

        debug!(
            frames = self.frame_count,
            avg_update_to_present_ns = self.snapshot.avg_update_to_present_ns,
            dropped = self.dropped_frame_sum,
            "frame metrics window saved"
        );
    }

    /// Reset the current window, keeping the whole-session sums.
    pub fn reset_window(&mut self, now_ns: u64) {
        self.window_start_ns = now_ns;
        self.native_poll.reset(now_ns);
        self.frame_count = 0;
        self.update_to_present.reset();
        self.pre_to_present.reset();
        self.post_to_present.reset();
        self.latency.reset();
        self.present_count_sum = 0;
        self.extra_frame_sum = 0;
        self.early_frame_sum = 0;
        self.dropped_frame_sum = 0;
    }

    /// Reset everything, including the whole-session sums and the snapshot.
    pub fn reset_all(&mut self, now_ns: u64) {
        self.reset_window(now_ns);
        self.frame_count_all = 0;
        self.update_to_present_all.reset();
        self.pre_to_present_all.reset();
        self.post_to_present_all.reset();
        self.latency_all.reset();
        self.present_count_sum_all = 0;
        self.extra_frame_sum_all = 0;
        self.early_frame_sum_all = 0;
        self.dropped_frame_sum_all = 0;
        self.snapshot = FrameMetricsSnapshot::default();
    }
}

#[allow(
    clippy::cast_precision_loss,
    reason = "telemetry ratios tolerate f32 rounding"
)]
fn ratio(sum: u64, count: u64) -> f32 {
    if count == 0 {
        return 0.0;
    }
    sum as f32 / count as f32
}

/// Hook fan-in: owns the per-frame records, the free list, the finish queue
/// and the rolling metrics.
#[derive(Debug)]
pub struct MetricsCollector {
    frames: HashMap<u64, FrameStats>,
    pool: Vec<FrameStats>,
    metrics: FrameMetrics,
    finish_queue: Arc<FrameFinishQueue>,
    counters: Arc<AtomicCounters>,
}

impl MetricsCollector {
    /// Create a collector.
    #[must_use]
    pub fn new(
        window_ns: u64,
        native_poll_interval_ns: u64,
        finish_queue_capacity: usize,
        counters: Arc<AtomicCounters>,
    ) -> Self {
        Self {
            frames: HashMap::new(),
            pool: Vec::new(),
            metrics: FrameMetrics::new(window_ns, native_poll_interval_ns),
            finish_queue: Arc::new(FrameFinishQueue::new(finish_queue_capacity)),
            counters,
        }
    }

    /// Handle the render thread uses to signal end-of-frame.
    #[must_use]
    pub fn finish_handle(&self) -> FrameFinishHandle {
        FrameFinishHandle {
            queue: Arc::clone(&self.finish_queue),
        }
    }

    fn frame_mut(&mut self, frame_idx: u64) -> &mut FrameStats {
        let pool = &mut self.pool;
        let counters = &self.counters;
        self.frames.entry(frame_idx).or_insert_with(|| {
            counters.inc_frames_opened();
            let mut stats = pool.pop().unwrap_or_default();
            stats.reset(frame_idx);
            stats
        })
    }

    /// Update hook: stamp the frame's update time.
    pub fn on_update(&mut self, frame_idx: u64, now_ns: u64) {
        self.frame_mut(frame_idx).update_time_ns = now_ns;
    }

    /// Per-eye pre-render hook.
    ///
    /// The left eye carries the frame's present time (the pose timestamp in
    /// effect when rendering starts).
    pub fn on_pre_render(&mut self, eye: Eye, frame_idx: u64, now_ns: u64, present_time_ns: u64) {
        let stats = self.frame_mut(frame_idx);
        match eye {
            Eye::Left => {
                stats.left_pre_render_time_ns = now_ns;
                stats.present_time_ns = present_time_ns;
            }
            Eye::Right => stats.right_pre_render_time_ns = now_ns,
        }
    }

    /// Per-eye post-render hook.
    pub fn on_post_render(&mut self, eye: Eye, frame_idx: u64, now_ns: u64) {
        let stats = self.frame_mut(frame_idx);
        match eye {
            Eye::Left => stats.left_post_render_time_ns = now_ns,
            Eye::Right => stats.right_post_render_time_ns = now_ns,
        }
    }

    /// Main-thread end-of-frame hook.
    pub fn on_end_of_frame(&mut self, frame_idx: u64, now_ns: u64) {
        self.frame_mut(frame_idx).end_of_frame_time_ns = now_ns;
    }

    /// Apply pending render-thread finish signals to their records.
    pub fn drain_finish_signals(&mut self) {
        while let Some((frame_idx, time_ns)) = self.finish_queue.pop() {
            let stats = self.frame_mut(frame_idx);
            if !stats.finished {
                stats.finished = true;
                stats.render_thread_end_time_ns = time_ns;
                self.counters.inc_frames_finished();
            }
        }
    }

    /// Fold at most one finished record into the metrics and recycle it.
    ///
    /// One record per pass bounds the work done inside the pre-render hook;
    /// one frame finishes per frame in steady state. Records are dropped
    /// (not folded) while the session is not running.
    pub fn check_finished(&mut self, running: bool, native: &dyn PresentMetricsSource, now_ns: u64) {
        let finished_idx = self
            .frames
            .iter()
            .find(|(_, stats)| stats.finished)
            .map(|(idx, _)| *idx);

        let Some(frame_idx) = finished_idx else {
            return;
        };
        let Some(mut stats) = self.frames.remove(&frame_idx) else {
            return;
        };

        if running {
            stats.feed_native(native);
            let result = self.metrics.feed(&stats, now_ns, native);
            if result.folded {
                self.counters.inc_frames_aggregated();
            } else {
                self.counters.inc_frames_dropped_invalid();
            }
        } else {
            self.counters.inc_frames_dropped_invalid();
        }

        stats.finished = false;
        self.pool.push(stats);
    }

    /// Number of frame records currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.frames.len()
    }

    /// The last saved averages.
    #[must_use]
    pub const fn snapshot(&self) -> FrameMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Reset the rolling window (kept sums survive).
    pub fn reset_window(&mut self, now_ns: u64) {
        self.metrics.reset_window(now_ns);
    }

    /// Reset all metrics state.
    pub fn reset_all(&mut self, now_ns: u64) {
        self.metrics.reset_all(now_ns);
    }
}
