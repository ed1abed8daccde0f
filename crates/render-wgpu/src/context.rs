//! wgpu implementation of the acquisition chain.

use godray_common::{GpuSettings, PowerPreference};
use godray_render::{FrameError, GraphicsPlatform, InitError};

/// Where frames end up.
pub enum Drawable {
    /// A window surface, e.g. an `Arc<winit::window::Window>` converted with `.into()`.
    Window {
        target: wgpu::SurfaceTarget<'static>,
        width: u32,
        height: u32,
    },
    /// An offscreen texture that can be read back.
    Headless { width: u32, height: u32 },
}

impl Drawable {
    pub fn size(&self) -> (u32, u32) {
        match self {
            Drawable::Window { width, height, .. } | Drawable::Headless { width, height } => {
                (*width, *height)
            }
        }
    }
}

/// Logical device plus its submission queue.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

enum PresentTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        caps: wgpu::SurfaceCapabilities,
        config: Option<wgpu::SurfaceConfiguration>,
    },
    Headless {
        texture: Option<wgpu::Texture>,
    },
}

/// The drawable bound to a device. Created unconfigured by
/// [`GraphicsPlatform::presentation_context`]; usable after `configure`.
pub struct Presentation {
    target: PresentTarget,
    format: wgpu::TextureFormat,
    alpha_mode: wgpu::CompositeAlphaMode,
    present_mode: wgpu::PresentMode,
    width: u32,
    height: u32,
}

/// One acquired output image. Surface frames must be presented after submit.
pub struct FrameTarget {
    frame: Option<wgpu::SurfaceTexture>,
    view: wgpu::TextureView,
}

impl FrameTarget {
    fn surface(frame: wgpu::SurfaceTexture) -> Self {
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            frame: Some(frame),
            view,
        }
    }

    fn headless(texture: &wgpu::Texture) -> Self {
        Self {
            frame: None,
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn present(self) {
        if let Some(frame) = self.frame {
            frame.present();
        }
    }
}

/// Canvas-style preference: plain 8-bit BGRA/RGBA first, sRGB variants only
/// as a fallback, anything the surface offers last.
pub fn preferred_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    const ORDER: [wgpu::TextureFormat; 4] = [
        wgpu::TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];
    ORDER
        .iter()
        .find(|f| formats.contains(f))
        .or_else(|| formats.first())
        .copied()
}

/// Opaque when the surface supports it, otherwise whatever it offers first.
pub fn preferred_alpha(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    if modes.contains(&wgpu::CompositeAlphaMode::Opaque) || modes.is_empty() {
        wgpu::CompositeAlphaMode::Opaque
    } else {
        modes[0]
    }
}

impl Presentation {
    pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    fn unconfigured(target: PresentTarget, width: u32, height: u32, vsync: bool) -> Self {
        Self {
            target,
            format: Self::HEADLESS_FORMAT,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            width: width.max(1),
            height: height.max(1),
        }
    }

    fn configure(&mut self, device: &wgpu::Device) {
        match &mut self.target {
            PresentTarget::Surface {
                surface,
                caps,
                config,
            } => {
                self.format = preferred_format(&caps.formats).unwrap_or(Self::HEADLESS_FORMAT);
                self.alpha_mode = preferred_alpha(&caps.alpha_modes);
                let surface_config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format: self.format,
                    width: self.width,
                    height: self.height,
                    present_mode: self.present_mode,
                    alpha_mode: self.alpha_mode,
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                surface.configure(device, &surface_config);
                *config = Some(surface_config);
            }
            PresentTarget::Headless { texture } => {
                if let Some(old) = texture.take() {
                    old.destroy();
                }
                *texture = Some(device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("headless_output"),
                    size: wgpu::Extent3d {
                        width: self.width,
                        height: self.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: Self::HEADLESS_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                }));
            }
        }
        tracing::debug!(
            format = ?self.format,
            alpha = ?self.alpha_mode,
            width = self.width,
            height = self.height,
            "presentation configured"
        );
    }

    /// Get the image this frame draws into. A lost or outdated surface is
    /// reconfigured and the frame reported as failed; the next one retries.
    pub fn acquire_frame(&self, device: &wgpu::Device) -> Result<FrameTarget, FrameError> {
        match &self.target {
            PresentTarget::Surface {
                surface, config, ..
            } => match surface.get_current_texture() {
                Ok(frame) => Ok(FrameTarget::surface(frame)),
                Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                    if let Some(config) = config {
                        surface.configure(device, config);
                    }
                    Err(FrameError::Surface(err.to_string()))
                }
                Err(wgpu::SurfaceError::OutOfMemory) => Err(FrameError::OutOfMemory),
                Err(err) => Err(FrameError::Surface(err.to_string())),
            },
            PresentTarget::Headless { texture } => texture
                .as_ref()
                .map(FrameTarget::headless)
                .ok_or_else(|| FrameError::Surface("presentation not configured".into())),
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.configure(device);
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The texture headless frames are drawn into.
    pub fn headless_texture(&self) -> Option<&wgpu::Texture> {
        match &self.target {
            PresentTarget::Headless { texture } => texture.as_ref(),
            PresentTarget::Surface { .. } => None,
        }
    }

    pub(crate) fn release(&mut self) {
        if let PresentTarget::Headless { texture } = &mut self.target {
            if let Some(texture) = texture.take() {
                texture.destroy();
            }
        }
    }
}

fn power_preference(preference: PowerPreference) -> wgpu::PowerPreference {
    match preference {
        PowerPreference::None => wgpu::PowerPreference::None,
        PowerPreference::Low => wgpu::PowerPreference::LowPower,
        PowerPreference::High => wgpu::PowerPreference::HighPerformance,
    }
}

/// A drawable that has not been bound to a device yet.
enum PendingTarget {
    /// `None` when surface creation already failed.
    Surface(Option<wgpu::Surface<'static>>),
    Headless,
}

/// The wgpu instance and the drawable it will present to.
///
/// Window surfaces are created in [`WgpuPlatform::new`], on the thread that
/// owns the window; the acquisition chain itself may then run elsewhere.
pub struct WgpuPlatform {
    instance: wgpu::Instance,
    backends: wgpu::Backends,
    pending: Option<PendingTarget>,
    width: u32,
    height: u32,
    settings: GpuSettings,
}

impl WgpuPlatform {
    pub fn new(drawable: Drawable, settings: GpuSettings) -> Self {
        let backends = wgpu::Backends::all();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let (width, height) = drawable.size();
        let pending = match drawable {
            Drawable::Window { target, .. } => match instance.create_surface(target) {
                Ok(surface) => PendingTarget::Surface(Some(surface)),
                Err(err) => {
                    tracing::warn!(error = %err, "surface creation failed");
                    PendingTarget::Surface(None)
                }
            },
            Drawable::Headless { .. } => PendingTarget::Headless,
        };
        Self {
            instance,
            backends,
            pending: Some(pending),
            width,
            height,
            settings,
        }
    }

    fn surface(&self) -> Option<&wgpu::Surface<'static>> {
        match &self.pending {
            Some(PendingTarget::Surface(surface)) => surface.as_ref(),
            _ => None,
        }
    }
}

/// Describe every adapter the native backends expose.
pub fn list_adapters() -> Vec<wgpu::AdapterInfo> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .iter()
        .map(wgpu::Adapter::get_info)
        .collect()
}

impl GraphicsPlatform for WgpuPlatform {
    type Adapter = wgpu::Adapter;
    type Device = GpuDevice;
    type Presentation = Presentation;

    fn is_supported(&self) -> bool {
        !self.instance.enumerate_adapters(self.backends).is_empty()
    }

    async fn request_adapter(&mut self) -> Option<wgpu::Adapter> {
        let adapter = self
            .instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power_preference(self.settings.power_preference),
                compatible_surface: self.surface(),
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        tracing::info!(
            name = %info.name,
            backend = info.backend.to_str(),
            device_type = ?info.device_type,
            "adapter selected"
        );
        Some(adapter)
    }

    async fn request_device(&mut self, adapter: &wgpu::Adapter) -> Result<GpuDevice, InitError> {
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("godray_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|err| InitError::DeviceRequest(err.to_string()))?;

        // Errors outside an error scope would otherwise abort the process.
        device.on_uncaptured_error(Box::new(|err| {
            tracing::error!(error = %err, "uncaptured GPU error");
        }));
        Ok(GpuDevice { device, queue })
    }

    fn presentation_context(
        &mut self,
        adapter: &wgpu::Adapter,
        _device: &GpuDevice,
    ) -> Option<Presentation> {
        let target = match self.pending.take()? {
            PendingTarget::Surface(surface) => {
                let surface = surface?;
                let caps = surface.get_capabilities(adapter);
                if caps.formats.is_empty() {
                    tracing::warn!("adapter cannot present to this surface");
                    return None;
                }
                PresentTarget::Surface {
                    surface,
                    caps,
                    config: None,
                }
            }
            PendingTarget::Headless => PresentTarget::Headless { texture: None },
        };
        Some(Presentation::unconfigured(
            target,
            self.width,
            self.height,
            self.settings.vsync,
        ))
    }

    fn configure(
        &mut self,
        _adapter: &wgpu::Adapter,
        device: &GpuDevice,
        presentation: &mut Presentation,
    ) {
        presentation.configure(&device.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    #[test]
    fn format_prefers_plain_unorm() {
        assert_eq!(
            preferred_format(&[F::Bgra8UnormSrgb, F::Bgra8Unorm]),
            Some(F::Bgra8Unorm)
        );
        assert_eq!(
            preferred_format(&[F::Rgba8UnormSrgb, F::Rgba8Unorm]),
            Some(F::Rgba8Unorm)
        );
        assert_eq!(preferred_format(&[F::Rgba8UnormSrgb]), Some(F::Rgba8UnormSrgb));
        assert_eq!(preferred_format(&[F::Rgb10a2Unorm]), Some(F::Rgb10a2Unorm));
        assert_eq!(preferred_format(&[]), None);
    }

    #[test]
    fn alpha_prefers_opaque() {
        use wgpu::CompositeAlphaMode as A;
        assert_eq!(preferred_alpha(&[A::PreMultiplied, A::Opaque]), A::Opaque);
        assert_eq!(preferred_alpha(&[A::PreMultiplied]), A::PreMultiplied);
        assert_eq!(preferred_alpha(&[]), A::Opaque);
    }

    #[test]
    fn drawable_size() {
        assert_eq!(
            Drawable::Headless {
                width: 800,
                height: 600
            }
            .size(),
            (800, 600)
        );
    }
}
