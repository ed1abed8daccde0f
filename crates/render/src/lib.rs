//! Backend-agnostic rendering core: acquisition chain, frame loop, lifecycle.
//!
//! # Invariants
//! - No frame is encoded before the whole acquisition chain succeeded.
//! - Once the stop flag is set, no further GPU submission happens.
//! - Frame failures are isolated to their frame; init failures end the mount.
//!
//! The wgpu backend lives in `godray-render-wgpu`; everything here is
//! testable without a GPU.

mod acquire;
mod error;
mod lifecycle;
mod renderer;
mod scheduler;
pub mod shading;
mod stop;

pub use acquire::{Acquired, GraphicsPlatform, acquire};
pub use error::{DiagnosticSeverity, FrameError, InitError, ShaderDiagnostic};
pub use lifecycle::{LifecycleState, MountToken, RendererLifecycle, SceneBuilder, initialize};
pub use renderer::{FrameRenderer, FrameRequester, ManualRequester};
pub use scheduler::{FrameScheduler, ScheduleMode, SchedulerStats, TickOutcome};
pub use stop::StopHandle;

pub fn crate_info() -> &'static str {
    "godray-render v0.1.0"
}
