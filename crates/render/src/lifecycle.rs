//! Mount-scoped renderer lifetime.
//!
//! A mount starts in `Initializing` with frame scheduling disabled. Only a
//! successful initialization result builds a [`FrameScheduler`] and flips it
//! to [`ScheduleMode::Always`]. Unmount sets the stop flag before anything is
//! released, so a frame callback that is already queued finds the loop dead.

use crate::acquire::{Acquired, GraphicsPlatform, acquire};
use crate::error::InitError;
use crate::renderer::{FrameRenderer, FrameRequester};
use crate::scheduler::{FrameScheduler, ScheduleMode, SchedulerStats, TickOutcome};
use crate::stop::StopHandle;
use tracing::Instrument;

/// Turns an acquired device into a ready-to-run renderer.
///
/// Building is async so that backends can await shader compilation info and
/// validation scopes before reporting the pipelines as created.
#[allow(async_fn_in_trait)]
pub trait SceneBuilder<P: GraphicsPlatform> {
    type Renderer: FrameRenderer;

    async fn build(&mut self, acquired: Acquired<P>) -> Result<Self::Renderer, InitError>;
}

/// The whole initialization chain: acquisition steps, then scene building.
/// Nothing is built unless every acquisition step succeeded.
pub async fn initialize<P, B>(platform: &mut P, builder: &mut B) -> Result<B::Renderer, InitError>
where
    P: GraphicsPlatform,
    B: SceneBuilder<P>,
{
    let acquired = acquire(platform).await?;
    builder
        .build(acquired)
        .instrument(tracing::info_span!("build_scene"))
        .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unmounted,
    Initializing,
    Running,
    Failed,
}

/// Identifies the mount an initialization result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountToken(u64);

pub struct RendererLifecycle<R, Q> {
    requester: Q,
    state: LifecycleState,
    generation: u64,
    stop: StopHandle,
    scheduler: Option<FrameScheduler<R, Q>>,
    last_error: Option<InitError>,
}

impl<R: FrameRenderer, Q: FrameRequester + Clone> RendererLifecycle<R, Q> {
    pub fn new(requester: Q) -> Self {
        let stop = StopHandle::new();
        stop.stop();
        Self {
            requester,
            state: LifecycleState::Unmounted,
            generation: 0,
            stop,
            scheduler: None,
            last_error: None,
        }
    }

    /// Begin a mount. Any previous mount is torn down first.
    pub fn mount(&mut self) -> MountToken {
        if self.state != LifecycleState::Unmounted {
            self.unmount();
        }
        self.generation += 1;
        self.stop = StopHandle::new();
        self.state = LifecycleState::Initializing;
        self.last_error = None;
        tracing::info!(generation = self.generation, "renderer mounted; waiting for device");
        MountToken(self.generation)
    }

    /// Deliver the result of the initialization started for `token`.
    ///
    /// Results for an older mount, or arriving after unmount, are released
    /// and ignored.
    pub fn complete(&mut self, token: MountToken, result: Result<R, InitError>) -> LifecycleState {
        if token.0 != self.generation || self.state != LifecycleState::Initializing {
            tracing::debug!(
                token = token.0,
                generation = self.generation,
                "discarding stale initialization result"
            );
            if let Ok(mut renderer) = result {
                renderer.release();
            }
            return self.state;
        }

        match result {
            Ok(renderer) => {
                let mut scheduler =
                    FrameScheduler::new(renderer, self.requester.clone(), self.stop.clone());
                scheduler.set_mode(ScheduleMode::Always);
                self.scheduler = Some(scheduler);
                self.state = LifecycleState::Running;
                tracing::info!("renderer ready; frame loop started");
            }
            Err(err) => {
                tracing::error!(error = %err, "renderer initialization failed; nothing will render");
                self.last_error = Some(err);
                self.state = LifecycleState::Failed;
            }
        }
        self.state
    }

    /// Host frame callback.
    pub fn on_frame(&mut self) -> TickOutcome {
        match &mut self.scheduler {
            Some(scheduler) => scheduler.tick(),
            None if self.stop.is_stopped() => TickOutcome::Stopped,
            None => TickOutcome::Idle,
        }
    }

    /// Stop the loop, then release GPU resources.
    pub fn unmount(&mut self) {
        self.stop.stop();
        if let Some(scheduler) = self.scheduler.take() {
            let stats = scheduler.stats();
            let mut renderer = scheduler.into_renderer();
            renderer.release();
            tracing::info!(
                submitted = stats.submitted,
                dropped = stats.dropped,
                "frame loop stopped"
            );
        }
        self.state = LifecycleState::Unmounted;
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn last_error(&self) -> Option<&InitError> {
        self.last_error.as_ref()
    }

    pub fn stats(&self) -> Option<SchedulerStats> {
        self.scheduler.as_ref().map(FrameScheduler::stats)
    }

    pub fn scheduler_mut(&mut self) -> Option<&mut FrameScheduler<R, Q>> {
        self.scheduler.as_mut()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut R> {
        self.scheduler.as_mut().map(FrameScheduler::renderer_mut)
    }
}

impl<R, Q> Drop for RendererLifecycle<R, Q> {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::mock::MockPlatform;
    use crate::renderer::ManualRequester;
    use crate::scheduler::testing::CountingRenderer;

    /// Records whether any resource creation was attempted.
    #[derive(Default)]
    struct MockBuilder {
        builds: usize,
        renderer: CountingRenderer,
    }

    impl SceneBuilder<MockPlatform> for MockBuilder {
        type Renderer = CountingRenderer;

        async fn build(&mut self, acquired: Acquired<MockPlatform>) -> Result<CountingRenderer, InitError> {
            assert_eq!(acquired.device, "mock-device");
            self.builds += 1;
            Ok(self.renderer.clone())
        }
    }

    fn lifecycle() -> (RendererLifecycle<CountingRenderer, ManualRequester>, ManualRequester) {
        let requester = ManualRequester::new();
        (RendererLifecycle::new(requester.clone()), requester)
    }

    #[test]
    fn failed_acquisition_never_builds_or_schedules() {
        for step in ["support", "adapter", "device", "presentation"] {
            let (mut lifecycle, requester) = lifecycle();
            let token = lifecycle.mount();

            let mut platform = MockPlatform::failing_at(step);
            let mut builder = MockBuilder::default();
            let result = pollster::block_on(initialize(&mut platform, &mut builder));

            assert_eq!(builder.builds, 0, "step {step}");
            assert_eq!(lifecycle.complete(token, result), LifecycleState::Failed);
            assert!(lifecycle.last_error().is_some());
            assert_eq!(lifecycle.on_frame(), TickOutcome::Idle);
            assert_eq!(requester.total(), 0, "step {step}");
        }
    }

    #[test]
    fn frames_gated_until_init_completes() {
        let (mut lifecycle, requester) = lifecycle();
        let token = lifecycle.mount();
        assert_eq!(lifecycle.state(), LifecycleState::Initializing);

        // Host callbacks before the device is ready do nothing.
        assert_eq!(lifecycle.on_frame(), TickOutcome::Idle);
        assert_eq!(requester.total(), 0);

        let mut builder = MockBuilder::default();
        let result = pollster::block_on(initialize(&mut MockPlatform::default(), &mut builder));
        assert_eq!(builder.builds, 1);
        assert_eq!(lifecycle.complete(token, result), LifecycleState::Running);
        assert_eq!(requester.pending(), 1);

        assert!(requester.take_request());
        assert_eq!(lifecycle.on_frame(), TickOutcome::Rendered);
        assert_eq!(builder.renderer.submissions(), 1);
    }

    #[test]
    fn unmount_stops_and_releases() {
        let (mut lifecycle, requester) = lifecycle();
        let token = lifecycle.mount();
        let renderer = CountingRenderer::default();
        lifecycle.complete(token, Ok(renderer.clone()));

        for _ in 0..3 {
            assert!(requester.take_request());
            lifecycle.on_frame();
        }
        assert_eq!(renderer.submissions(), 3);
        let stop = lifecycle.stop_handle();

        lifecycle.unmount();
        assert!(stop.is_stopped());
        assert!(renderer.was_released());
        assert_eq!(lifecycle.state(), LifecycleState::Unmounted);

        // The request made by the third frame still fires.
        assert!(requester.take_request());
        assert_eq!(lifecycle.on_frame(), TickOutcome::Stopped);
        assert_eq!(renderer.submissions(), 3);
    }

    #[test]
    fn stale_result_from_previous_mount_is_released() {
        let (mut lifecycle, requester) = lifecycle();
        let old = lifecycle.mount();
        let first_stop = lifecycle.stop_handle();
        let fresh = lifecycle.mount();
        assert!(first_stop.is_stopped());
        assert!(!lifecycle.stop_handle().is_stopped());

        let stale = CountingRenderer::default();
        assert_eq!(
            lifecycle.complete(old, Ok(stale.clone())),
            LifecycleState::Initializing
        );
        assert!(stale.was_released());
        assert_eq!(requester.total(), 0);

        assert_eq!(
            lifecycle.complete(fresh, Ok(CountingRenderer::default())),
            LifecycleState::Running
        );
    }

    #[test]
    fn result_after_unmount_is_ignored() {
        let (mut lifecycle, requester) = lifecycle();
        let token = lifecycle.mount();
        lifecycle.unmount();

        let late = CountingRenderer::default();
        assert_eq!(lifecycle.complete(token, Ok(late.clone())), LifecycleState::Unmounted);
        assert!(late.was_released());
        assert_eq!(requester.total(), 0);
    }

    #[test]
    fn remount_after_failure_can_succeed() {
        let (mut lifecycle, _requester) = lifecycle();
        let token = lifecycle.mount();
        lifecycle.complete(token, Err(InitError::NoAdapter));
        assert_eq!(lifecycle.state(), LifecycleState::Failed);

        let token = lifecycle.mount();
        assert!(lifecycle.last_error().is_none());
        assert_eq!(
            lifecycle.complete(token, Ok(CountingRenderer::default())),
            LifecycleState::Running
        );
    }
}
