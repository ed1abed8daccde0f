use crate::resources::{GpuBuffer, ResourceFactory};

/// Floating-point offscreen image the scene pass renders into and the post
/// pass samples from. Sized to the output; rebuilt on resize.
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

fn post_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    view: &wgpu::TextureView,
    streak_params: &GpuBuffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("post_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: streak_params.as_entire_binding(),
            },
        ],
    })
}

impl RenderTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Value the scene pass clears to.
    pub const CLEAR: wgpu::Color = wgpu::Color::BLACK;

    pub fn new(
        device: &wgpu::Device,
        factory: &mut ResourceFactory,
        layout: &wgpu::BindGroupLayout,
        streak_params: &GpuBuffer,
        width: u32,
        height: u32,
    ) -> Self {
        let texture = factory.render_texture(device, "offscreen_target", Self::FORMAT, width, height);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = factory.linear_sampler(device, "offscreen_sampler");
        let bind_group = post_bind_group(device, layout, &sampler, &view, streak_params);
        Self {
            texture,
            view,
            sampler,
            bind_group,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Replace the texture with one of the new size. The sampler is kept.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        factory: &mut ResourceFactory,
        layout: &wgpu::BindGroupLayout,
        streak_params: &GpuBuffer,
        width: u32,
        height: u32,
    ) {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return;
        }
        let texture = factory.render_texture(device, "offscreen_target", Self::FORMAT, width, height);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.bind_group = post_bind_group(device, layout, &self.sampler, &view, streak_params);
        self.view = view;
        factory.release_texture(std::mem::replace(&mut self.texture, texture));
        self.width = width;
        self.height = height;
        tracing::debug!(width, height, "offscreen target resized");
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn release(self, factory: &mut ResourceFactory) {
        factory.release_texture(self.texture);
        factory.release_sampler(self.sampler);
    }
}
