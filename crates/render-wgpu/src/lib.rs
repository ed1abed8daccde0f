//! wgpu backend for the light-streak renderer.
//!
//! Acquires a device through [`WgpuPlatform`], uploads a UV sphere, renders
//! it with procedural clouds into an `Rgba16Float` offscreen target, then
//! runs a radial light-streak pass over that target onto the drawable.
//!
//! # Invariants
//! - Both pipelines use explicit bind group layouts.
//! - The drawable's view is re-acquired every frame, after the scene pass is
//!   recorded.
//! - Every buffer and texture goes back through the [`ResourceFactory`] on
//!   release; the ledger reads zero afterwards.
//! - GPU errors inside a frame are caught by error scopes and reported as
//!   [`godray_render::FrameError`]; they never abort the process.

mod capture;
mod context;
mod params;
mod pipeline;
mod renderer;
mod resources;
pub mod shaders;
mod target;

pub use capture::{CaptureError, CapturedImage, padded_bytes_per_row, read_texture};
pub use context::{
    Drawable, FrameTarget, GpuDevice, Presentation, WgpuPlatform, list_adapters, preferred_alpha,
    preferred_format,
};
pub use params::{CloudUniforms, StreakUniforms};
pub use pipeline::PipelineSet;
pub use renderer::{SceneRenderer, WgpuSceneBuilder};
pub use shaders::ShaderSources;
pub use resources::{BufferRole, GpuBuffer, ResourceFactory, ResourceLedger};
pub use target::RenderTarget;

pub fn crate_info() -> &'static str {
    "godray-render-wgpu v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("wgpu"));
    }
}
