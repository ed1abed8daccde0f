//! Continuous frame loop with cooperative cancellation.
//!
//! The scheduler never runs frames itself. The host calls [`FrameScheduler::tick`]
//! whenever its frame primitive fires; the tick renders at most one frame and
//! asks the host for the next one according to the [`ScheduleMode`].

use crate::renderer::{FrameRenderer, FrameRequester};
use crate::stop::StopHandle;

/// When a tick asks the host for another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleMode {
    /// Never render; ticks are ignored. Used while initialization is pending.
    #[default]
    Never,
    /// Render only after [`FrameScheduler::invalidate`].
    Demand,
    /// Render every tick and always request the next one.
    Always,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was submitted.
    Rendered,
    /// The frame failed and was dropped; the loop continues.
    Dropped,
    /// Scheduling mode is `Never`; nothing was encoded.
    Idle,
    /// The stop flag was set; nothing was encoded.
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub dropped: u64,
    /// Ticks that arrived after the stop flag was set.
    pub late_ticks: u64,
}

/// Drives a [`FrameRenderer`] from the host's frame callbacks.
pub struct FrameScheduler<R, Q> {
    renderer: R,
    requester: Q,
    stop: StopHandle,
    mode: ScheduleMode,
    pending: bool,
    stats: SchedulerStats,
}

impl<R: FrameRenderer, Q: FrameRequester> FrameScheduler<R, Q> {
    pub fn new(renderer: R, requester: Q, stop: StopHandle) -> Self {
        Self {
            renderer,
            requester,
            stop,
            mode: ScheduleMode::Never,
            pending: false,
            stats: SchedulerStats::default(),
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    /// Switch scheduling mode. Leaving `Never` for `Always` kicks off the loop.
    pub fn set_mode(&mut self, mode: ScheduleMode) {
        let previous = self.mode;
        self.mode = mode;
        tracing::debug!(?previous, ?mode, "schedule mode changed");
        if mode == ScheduleMode::Always && previous != ScheduleMode::Always {
            self.request();
        }
    }

    /// Ask for one frame in `Demand` (or `Always`) mode.
    pub fn invalidate(&mut self) {
        if self.mode != ScheduleMode::Never {
            self.request();
        }
    }

    /// Run one frame callback.
    pub fn tick(&mut self) -> TickOutcome {
        self.pending = false;

        // A callback queued before teardown may still arrive.
        if self.stop.is_stopped() {
            self.stats.late_ticks += 1;
            return TickOutcome::Stopped;
        }
        if self.mode == ScheduleMode::Never {
            return TickOutcome::Idle;
        }

        let outcome = {
            let _span = tracing::trace_span!("frame", index = self.stats.submitted).entered();
            match self.renderer.render_frame() {
                Ok(()) => {
                    self.stats.submitted += 1;
                    TickOutcome::Rendered
                }
                Err(err) => {
                    self.stats.dropped += 1;
                    tracing::warn!(error = %err, dropped = self.stats.dropped, "frame dropped");
                    TickOutcome::Dropped
                }
            }
        };

        if self.mode == ScheduleMode::Always {
            self.request();
        }
        outcome
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Stop the loop and hand the renderer back for release.
    pub fn into_renderer(self) -> R {
        self.stop.stop();
        self.renderer
    }

    fn request(&mut self) {
        if self.pending || self.stop.is_stopped() {
            return;
        }
        self.pending = true;
        self.requester.request_frame();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CountingRenderer;
    use super::*;
    use crate::renderer::ManualRequester;

    fn running() -> (FrameScheduler<CountingRenderer, ManualRequester>, CountingRenderer, ManualRequester) {
        let renderer = CountingRenderer::default();
        let requester = ManualRequester::new();
        let mut scheduler = FrameScheduler::new(renderer.clone(), requester.clone(), StopHandle::new());
        scheduler.set_mode(ScheduleMode::Always);
        (scheduler, renderer, requester)
    }

    /// Drain the requester like a host event loop would, up to `limit` ticks.
    fn pump(
        scheduler: &mut FrameScheduler<CountingRenderer, ManualRequester>,
        requester: &ManualRequester,
        limit: usize,
    ) -> usize {
        let mut ticks = 0;
        while ticks < limit && requester.take_request() {
            scheduler.tick();
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn never_mode_does_no_work() {
        let renderer = CountingRenderer::default();
        let requester = ManualRequester::new();
        let mut scheduler = FrameScheduler::new(renderer.clone(), requester.clone(), StopHandle::new());
        assert_eq!(scheduler.tick(), TickOutcome::Idle);
        assert_eq!(renderer.submissions(), 0);
        assert_eq!(requester.total(), 0);
    }

    #[test]
    fn always_mode_reschedules_every_frame() {
        let (mut scheduler, renderer, requester) = running();
        assert_eq!(requester.pending(), 1);
        assert_eq!(pump(&mut scheduler, &requester, 10), 10);
        assert_eq!(renderer.submissions(), 10);
        // The tenth frame asked for an eleventh.
        assert_eq!(requester.pending(), 1);
    }

    #[test]
    fn no_submissions_after_stop() {
        let (mut scheduler, renderer, requester) = running();
        pump(&mut scheduler, &requester, 5);
        assert_eq!(renderer.submissions(), 5);

        scheduler.stop_handle().stop();
        // The callback requested by frame five is still queued.
        assert_eq!(requester.pending(), 1);
        let ticks = pump(&mut scheduler, &requester, 5);
        assert_eq!(ticks, 1);
        assert_eq!(renderer.submissions(), 5);
        assert_eq!(scheduler.stats().late_ticks, 1);
        assert_eq!(requester.pending(), 0);

        // Spurious host callbacks are no-ops too.
        for _ in 0..5 {
            assert_eq!(scheduler.tick(), TickOutcome::Stopped);
        }
        assert_eq!(renderer.submissions(), 5);
    }

    #[test]
    fn dropped_frame_keeps_loop_alive() {
        let renderer = CountingRenderer {
            fail_on: vec![1, 2],
            ..CountingRenderer::default()
        };
        let requester = ManualRequester::new();
        let mut scheduler = FrameScheduler::new(renderer.clone(), requester.clone(), StopHandle::new());
        scheduler.set_mode(ScheduleMode::Always);

        assert_eq!(pump(&mut scheduler, &requester, 6), 6);
        assert_eq!(renderer.submissions(), 4);
        assert_eq!(scheduler.stats().dropped, 2);
        assert_eq!(scheduler.stats().submitted, 4);
        assert_eq!(requester.pending(), 1);
    }

    #[test]
    fn demand_mode_renders_once_per_invalidate() {
        let renderer = CountingRenderer::default();
        let requester = ManualRequester::new();
        let mut scheduler = FrameScheduler::new(renderer.clone(), requester.clone(), StopHandle::new());
        scheduler.set_mode(ScheduleMode::Demand);
        assert_eq!(requester.pending(), 0);

        scheduler.invalidate();
        scheduler.invalidate();
        // Requests coalesce until the next tick.
        assert_eq!(requester.pending(), 1);
        assert_eq!(pump(&mut scheduler, &requester, 10), 1);
        assert_eq!(renderer.submissions(), 1);
        assert_eq!(requester.pending(), 0);
    }

    #[test]
    fn invalidate_ignored_while_never() {
        let requester = ManualRequester::new();
        let mut scheduler =
            FrameScheduler::new(CountingRenderer::default(), requester.clone(), StopHandle::new());
        scheduler.invalidate();
        assert_eq!(requester.total(), 0);
    }

    #[test]
    fn into_renderer_stops_loop() {
        let (scheduler, _renderer, _requester) = running();
        let stop = scheduler.stop_handle().clone();
        let _renderer = scheduler.into_renderer();
        assert!(stop.is_stopped());
    }
}
