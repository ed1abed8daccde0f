//! The two render pipelines and their explicit bind group layouts.

use std::num::NonZeroU64;

use godray_render::{DiagnosticSeverity, InitError, ShaderDiagnostic};

use crate::params::{CloudUniforms, StreakUniforms};
use crate::resources::ResourceFactory;
use crate::shaders::ShaderSources;
use crate::target::RenderTarget;

pub struct PipelineSet {
    pub scene: wgpu::RenderPipeline,
    pub post: wgpu::RenderPipeline,
    /// Binding 0: cloud uniforms.
    pub scene_layout: wgpu::BindGroupLayout,
    /// Binding 0: sampler, 1: offscreen texture, 2: streak uniforms.
    pub post_layout: wgpu::BindGroupLayout,
    pub diagnostics: Vec<ShaderDiagnostic>,
    modules: Vec<wgpu::ShaderModule>,
}

fn uniform_entry<T>(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        },
        count: None,
    }
}

fn scene_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("scene_bind_group_layout"),
        entries: &[uniform_entry::<CloudUniforms>(
            0,
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        )],
    })
}

fn post_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("post_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            uniform_entry::<StreakUniforms>(2, wgpu::ShaderStages::FRAGMENT),
        ],
    })
}

async fn diagnostics(shader: &'static str, module: &wgpu::ShaderModule) -> Vec<ShaderDiagnostic> {
    module
        .get_compilation_info()
        .await
        .messages
        .into_iter()
        .map(|msg| ShaderDiagnostic {
            shader,
            severity: match msg.message_type {
                wgpu::CompilationMessageType::Error => DiagnosticSeverity::Error,
                wgpu::CompilationMessageType::Warning => DiagnosticSeverity::Warning,
                wgpu::CompilationMessageType::Info => DiagnosticSeverity::Info,
            },
            message: msg.message,
            line: msg.location.map(|loc| loc.line_number),
        })
        .collect()
}

/// Build one pipeline inside a validation scope so a bad shader or layout
/// comes back as an error value.
async fn checked<F>(
    device: &wgpu::Device,
    factory: &mut ResourceFactory,
    pipeline: &'static str,
    source: &str,
    out: &mut Vec<ShaderDiagnostic>,
    build: F,
) -> Result<(wgpu::RenderPipeline, wgpu::ShaderModule), InitError>
where
    F: FnOnce(&wgpu::ShaderModule) -> wgpu::RenderPipeline,
{
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = factory.shader_module(device, pipeline, source);
    let render_pipeline = build(&module);
    let error = device.pop_error_scope().await;

    let messages = diagnostics(pipeline, &module).await;
    for diagnostic in &messages {
        diagnostic.log();
    }
    out.extend(messages);

    match error {
        Some(err) => {
            factory.release_shader_module(module);
            Err(InitError::PipelineCreation {
                pipeline,
                message: err.to_string(),
            })
        }
        None => {
            tracing::debug!(pipeline, "pipeline created");
            Ok((render_pipeline, module))
        }
    }
}

impl PipelineSet {
    /// `output_format` is the negotiated presentation format the post pass
    /// writes to. A shader that fails to compile or validate comes back as
    /// [`InitError::PipelineCreation`] with every module created so far
    /// released.
    pub async fn new(
        device: &wgpu::Device,
        factory: &mut ResourceFactory,
        output_format: wgpu::TextureFormat,
        sources: &ShaderSources,
    ) -> Result<Self, InitError> {
        let scene_layout = scene_layout(device);
        let post_layout = post_layout(device);
        let mut diagnostics = Vec::new();

        let scene_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&scene_layout],
            push_constant_ranges: &[],
        });
        let (scene, scene_module) = checked(
            device,
            factory,
            "scene",
            &sources.scene,
            &mut diagnostics,
            |module| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("scene_pipeline"),
                    layout: Some(&scene_pipeline_layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some("vs_main"),
                        compilation_options: Default::default(),
                        buffers: &[wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<[f32; 3]>() as u64,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                        }],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs_main"),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: RenderTarget::FORMAT,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: Default::default(),
                    multiview: None,
                    cache: None,
                })
            },
        )
        .await?;

        let post_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post_pipeline_layout"),
            bind_group_layouts: &[&post_layout],
            push_constant_ranges: &[],
        });
        let post_result = checked(
            device,
            factory,
            "post",
            &sources.post,
            &mut diagnostics,
            |module| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("post_pipeline"),
                    layout: Some(&post_pipeline_layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some("vs_main"),
                        compilation_options: Default::default(),
                        buffers: &[],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some("fs_main"),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: output_format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: Default::default(),
                    multiview: None,
                    cache: None,
                })
            },
        )
        .await;
        let (post, post_module) = match post_result {
            Ok(created) => created,
            Err(err) => {
                factory.release_shader_module(scene_module);
                return Err(err);
            }
        };

        Ok(Self {
            scene,
            post,
            scene_layout,
            post_layout,
            diagnostics,
            modules: vec![scene_module, post_module],
        })
    }

    pub fn release(self, factory: &mut ResourceFactory) {
        for module in self.modules {
            factory.release_shader_module(module);
        }
    }
}
