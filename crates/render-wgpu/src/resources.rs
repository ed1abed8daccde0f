//! GPU resource creation and explicit release.
//!
//! Every buffer, texture and sampler the renderer owns is created through a
//! [`ResourceFactory`] and handed back to it on release. The [`ResourceLedger`]
//! counts what is still alive so teardown can be checked.

use std::borrow::Cow;

/// What a buffer is for. Determines its usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Vertex,
    Index,
    Uniform,
    Readback,
}

impl BufferRole {
    fn usage(self) -> wgpu::BufferUsages {
        match self {
            BufferRole::Vertex => wgpu::BufferUsages::VERTEX,
            BufferRole::Index => wgpu::BufferUsages::INDEX,
            BufferRole::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            BufferRole::Readback => wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        }
    }
}

/// A buffer plus the length of its meaningful contents. The allocation may be
/// padded up to the copy alignment.
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    role: BufferRole,
    len: u64,
}

impl GpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// The initialized bytes, excluding alignment padding.
    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..self.len)
    }

    pub fn as_entire_binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLedger {
    pub buffers: usize,
    pub textures: usize,
    pub samplers: usize,
    pub shader_modules: usize,
}

impl ResourceLedger {
    pub fn live(&self) -> usize {
        self.buffers + self.textures + self.samplers + self.shader_modules
    }
}

/// Allocation size for `len` bytes: at least one alignment unit, rounded up.
pub fn padded_size(len: u64) -> u64 {
    wgpu::util::align_to(len, wgpu::COPY_BUFFER_ALIGNMENT).max(wgpu::COPY_BUFFER_ALIGNMENT)
}

#[derive(Debug, Default)]
pub struct ResourceFactory {
    ledger: ResourceLedger,
}

impl ResourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> ResourceLedger {
        self.ledger
    }

    /// Create a buffer mapped at creation, copy `contents` in and unmap.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        role: BufferRole,
        contents: &[u8],
    ) -> GpuBuffer {
        let len = contents.len() as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: padded_size(len),
            usage: role.usage(),
            mapped_at_creation: true,
        });
        buffer.slice(..).get_mapped_range_mut()[..contents.len()].copy_from_slice(contents);
        buffer.unmap();
        self.ledger.buffers += 1;
        tracing::trace!(label, ?role, len, "buffer uploaded");
        GpuBuffer { buffer, role, len }
    }

    /// Create an unmapped buffer for GPU-to-CPU copies.
    pub fn readback(&mut self, device: &wgpu::Device, label: &str, len: u64) -> GpuBuffer {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: padded_size(len),
            usage: BufferRole::Readback.usage(),
            mapped_at_creation: false,
        });
        self.ledger.buffers += 1;
        GpuBuffer {
            buffer,
            role: BufferRole::Readback,
            len,
        }
    }

    pub fn render_texture(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> wgpu::Texture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        self.ledger.textures += 1;
        texture
    }

    pub fn linear_sampler(&mut self, device: &wgpu::Device, label: &str) -> wgpu::Sampler {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        self.ledger.samplers += 1;
        sampler
    }

    pub fn shader_module(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
    ) -> wgpu::ShaderModule {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        });
        self.ledger.shader_modules += 1;
        module
    }

    pub fn release_buffer(&mut self, buffer: GpuBuffer) {
        tracing::trace!(role = ?buffer.role, len = buffer.len, "buffer released");
        buffer.buffer.destroy();
        self.ledger.buffers -= 1;
    }

    pub fn release_texture(&mut self, texture: wgpu::Texture) {
        texture.destroy();
        self.ledger.textures -= 1;
    }

    /// Samplers and shader modules have no explicit destroy; dropping the
    /// last handle frees them.
    pub fn release_sampler(&mut self, sampler: wgpu::Sampler) {
        drop(sampler);
        self.ledger.samplers -= 1;
    }

    pub fn release_shader_module(&mut self, module: wgpu::ShaderModule) {
        drop(module);
        self.ledger.shader_modules -= 1;
    }
}
