use godray_common::{ConfigError, RenderConfig, StreakSettings};
use godray_geometry::SphereMesh;
use godray_render::{Acquired, FrameError, FrameRenderer, InitError, SceneBuilder, ShaderDiagnostic};

use crate::capture::{self, CaptureError, CapturedImage};
use crate::context::{GpuDevice, Presentation, WgpuPlatform};
use crate::params::{CloudUniforms, StreakUniforms};
use crate::pipeline::PipelineSet;
use crate::resources::{BufferRole, GpuBuffer, ResourceFactory, ResourceLedger};
use crate::shaders::{FULLSCREEN_VERTICES, ShaderSources};
use crate::target::RenderTarget;

/// Everything created after acquisition. Dropped as a unit on release.
struct SceneResources {
    pipelines: PipelineSet,
    target: RenderTarget,
    vertices: GpuBuffer,
    indices: GpuBuffer,
    index_count: u32,
    cloud_params: GpuBuffer,
    streak_params: GpuBuffer,
    scene_bind_group: wgpu::BindGroup,
}

/// Sphere scene pass into the offscreen target, then the light-streak pass
/// onto the drawable.
pub struct SceneRenderer {
    gpu: GpuDevice,
    adapter: wgpu::Adapter,
    presentation: Presentation,
    factory: ResourceFactory,
    resources: Option<SceneResources>,
}

impl SceneRenderer {
    pub async fn new(
        acquired: Acquired<WgpuPlatform>,
        config: &RenderConfig,
        shaders: &ShaderSources,
    ) -> Result<Self, InitError> {
        config
            .validate()
            .map_err(|err| InitError::InvalidScene(err.to_string()))?;
        let Acquired {
            adapter,
            device: gpu,
            presentation,
        } = acquired;
        let mut factory = ResourceFactory::new();
        let device = &gpu.device;

        let mesh = SphereMesh::from_settings(&config.sphere)
            .map_err(|err| InitError::InvalidScene(err.to_string()))?;
        let index_count = u32::try_from(mesh.index_count())
            .map_err(|_| InitError::InvalidScene("index count overflows u32".into()))?;

        let pipelines = PipelineSet::new(device, &mut factory, presentation.format(), shaders).await?;

        let vertices = factory.upload(device, "sphere_vertices", BufferRole::Vertex, mesh.position_bytes());
        let indices = factory.upload(device, "sphere_indices", BufferRole::Index, mesh.index_bytes());
        let cloud_params = factory.upload(
            device,
            "cloud_params",
            BufferRole::Uniform,
            bytemuck::bytes_of(&CloudUniforms::from_settings(&config.clouds)),
        );
        let streak_params = factory.upload(
            device,
            "streak_params",
            BufferRole::Uniform,
            bytemuck::bytes_of(&StreakUniforms::from_settings(&config.streak)),
        );

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &pipelines.scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: cloud_params.as_entire_binding(),
            }],
        });

        let (width, height) = presentation.size();
        let target = RenderTarget::new(
            device,
            &mut factory,
            &pipelines.post_layout,
            &streak_params,
            width,
            height,
        );

        tracing::info!(
            vertices = mesh.vertex_count(),
            indices = index_count,
            layout = ?mesh.layout(),
            width,
            height,
            format = ?presentation.format(),
            "scene resources created"
        );

        Ok(Self {
            gpu,
            adapter,
            presentation,
            factory,
            resources: Some(SceneResources {
                pipelines,
                target,
                vertices,
                indices,
                index_count,
                cloud_params,
                streak_params,
                scene_bind_group,
            }),
        })
    }

    /// Rebuild size-dependent state: the drawable and the offscreen target.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.presentation.resize(&self.gpu.device, width, height);
        if let Some(res) = &mut self.resources {
            let (width, height) = self.presentation.size();
            res.target.resize(
                &self.gpu.device,
                &mut self.factory,
                &res.pipelines.post_layout,
                &res.streak_params,
                width,
                height,
            );
        }
    }

    /// Replace the streak parameters used from the next frame on. Settings
    /// that fail validation are not uploaded.
    pub fn set_streak(&mut self, streak: &StreakSettings) -> Result<(), ConfigError> {
        streak.validate()?;
        if let Some(res) = &self.resources {
            self.gpu.queue.write_buffer(
                res.streak_params.raw(),
                0,
                bytemuck::bytes_of(&StreakUniforms::from_settings(streak)),
            );
        }
        Ok(())
    }

    fn encode_scene_pass(res: &SceneResources, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: res.target.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(RenderTarget::CLEAR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        pass.set_pipeline(&res.pipelines.scene);
        pass.set_bind_group(0, &res.scene_bind_group, &[]);
        pass.set_vertex_buffer(0, res.vertices.slice());
        pass.set_index_buffer(res.indices.slice(), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..res.index_count, 0, 0..1);
    }

    fn encode_post_pass(res: &SceneResources, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("post_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        pass.set_pipeline(&res.pipelines.post);
        pass.set_bind_group(0, res.target.bind_group(), &[]);
        pass.draw(0..FULLSCREEN_VERTICES, 0..1);
    }

    /// Read back what the last frame presented. Headless drawables only.
    pub fn capture_output(&mut self) -> Result<CapturedImage, CaptureError> {
        let texture = self
            .presentation
            .headless_texture()
            .ok_or(CaptureError::NoSource("drawable is a window surface"))?;
        capture::read_texture(&self.gpu, &mut self.factory, texture)
    }

    /// Read back the offscreen scene image (`Rgba16Float`).
    pub fn capture_offscreen(&mut self) -> Result<CapturedImage, CaptureError> {
        let res = self
            .resources
            .as_ref()
            .ok_or(CaptureError::NoSource("renderer released"))?;
        capture::read_texture(&self.gpu, &mut self.factory, res.target.texture())
    }

    pub fn diagnostics(&self) -> &[ShaderDiagnostic] {
        self.resources
            .as_ref()
            .map_or(&[][..], |res| res.pipelines.diagnostics.as_slice())
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn ledger(&self) -> ResourceLedger {
        self.factory.ledger()
    }

    pub fn is_released(&self) -> bool {
        self.resources.is_none()
    }
}

impl FrameRenderer for SceneRenderer {
    fn render_frame(&mut self) -> Result<(), FrameError> {
        let res = self.resources.as_ref().ok_or(FrameError::Released)?;
        let device = &self.gpu.device;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
        Self::encode_scene_pass(res, &mut encoder);

        // The drawable's current image changes every frame.
        let frame = match self.presentation.acquire_frame(device) {
            Ok(frame) => frame,
            Err(err) => {
                let _ = pollster::block_on(device.pop_error_scope());
                let _ = pollster::block_on(device.pop_error_scope());
                return Err(err);
            }
        };
        Self::encode_post_pass(res, &mut encoder, frame.view());

        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        frame.present();

        if let Some(err) = validation {
            return Err(FrameError::Validation(err.to_string()));
        }
        if out_of_memory.is_some() {
            return Err(FrameError::OutOfMemory);
        }
        Ok(())
    }

    fn release(&mut self) {
        let Some(res) = self.resources.take() else {
            return;
        };
        res.target.release(&mut self.factory);
        res.pipelines.release(&mut self.factory);
        for buffer in [res.vertices, res.indices, res.cloud_params, res.streak_params] {
            self.factory.release_buffer(buffer);
        }
        self.presentation.release();
        tracing::debug!(live = self.factory.ledger().live(), "scene resources released");
    }
}

/// Builds a [`SceneRenderer`] from a [`RenderConfig`] once the device is ready.
#[derive(Debug, Clone, Default)]
pub struct WgpuSceneBuilder {
    config: RenderConfig,
    shaders: ShaderSources,
}

impl WgpuSceneBuilder {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            shaders: ShaderSources::default(),
        }
    }

    /// Build with different WGSL than the built-in shaders.
    pub fn with_shaders(mut self, shaders: ShaderSources) -> Self {
        self.shaders = shaders;
        self
    }
}

impl SceneBuilder<WgpuPlatform> for WgpuSceneBuilder {
    type Renderer = SceneRenderer;

    async fn build(&mut self, acquired: Acquired<WgpuPlatform>) -> Result<SceneRenderer, InitError> {
        SceneRenderer::new(acquired, &self.config, &self.shaders).await
    }
}
