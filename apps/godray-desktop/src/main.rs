use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use godray_common::RenderConfig;
use godray_render::{
    FrameRenderer, FrameRequester, InitError, LifecycleState, MountToken, RendererLifecycle,
    initialize,
};
use godray_render_wgpu::{Drawable, SceneRenderer, WgpuPlatform, WgpuSceneBuilder};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "godray-desktop", about = "Light-streak sphere in a window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML or JSON render configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable vsync
    #[arg(long)]
    no_vsync: bool,
}

/// Delivered to the event loop when background device init finishes.
enum UserEvent {
    Initialized(MountToken, Result<SceneRenderer, InitError>),
}

/// Next frame = next `RedrawRequested`.
#[derive(Clone)]
struct RedrawRequester(Arc<Window>);

impl FrameRequester for RedrawRequester {
    fn request_frame(&self) {
        self.0.request_redraw();
    }
}

struct App {
    config: RenderConfig,
    proxy: EventLoopProxy<UserEvent>,
    window: Option<Arc<Window>>,
    lifecycle: Option<RendererLifecycle<SceneRenderer, RedrawRequester>>,
}

impl App {
    fn new(config: RenderConfig, proxy: EventLoopProxy<UserEvent>) -> Self {
        Self {
            config,
            proxy,
            window: None,
            lifecycle: None,
        }
    }

    /// Create the surface here, on the window's thread, and finish the
    /// acquisition chain on a worker. Frames stay gated until the result
    /// comes back as a user event.
    fn start_renderer(&mut self, window: &Arc<Window>) -> Result<()> {
        let mut lifecycle = RendererLifecycle::new(RedrawRequester(window.clone()));
        let token = lifecycle.mount();

        let size = window.inner_size();
        let platform = WgpuPlatform::new(
            Drawable::Window {
                target: window.clone().into(),
                width: size.width,
                height: size.height,
            },
            self.config.gpu,
        );
        let builder = WgpuSceneBuilder::new(self.config.clone());
        let proxy = self.proxy.clone();
        std::thread::Builder::new()
            .name("gpu-init".into())
            .spawn(move || {
                let (mut platform, mut builder) = (platform, builder);
                let result = pollster::block_on(initialize(&mut platform, &mut builder));
                if proxy.send_event(UserEvent::Initialized(token, result)).is_err() {
                    tracing::debug!("event loop closed before initialization finished");
                }
            })?;

        self.lifecycle = Some(lifecycle);
        Ok(())
    }
}

/// Hand an init result to the lifecycle. Init can outlive the window once
/// close has been requested; the renderer is released right away then.
fn deliver<R: FrameRenderer, Q: FrameRequester + Clone>(
    lifecycle: Option<&mut RendererLifecycle<R, Q>>,
    token: MountToken,
    result: Result<R, InitError>,
) -> Option<LifecycleState> {
    match lifecycle {
        Some(lifecycle) => Some(lifecycle.complete(token, result)),
        None => {
            if let Ok(mut renderer) = result {
                renderer.release();
            }
            None
        }
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("godray")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                tracing::error!(error = %err, "failed to create window");
                event_loop.exit();
                return;
            }
        };

        if let Err(err) = self.start_renderer(&window) {
            tracing::error!(error = %err, "failed to start renderer");
            event_loop.exit();
            return;
        }
        self.window = Some(window);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Initialized(token, result) => {
                if deliver(self.lifecycle.as_mut(), token, result) != Some(LifecycleState::Running) {
                    return;
                }
                let renderer = self
                    .lifecycle
                    .as_mut()
                    .and_then(RendererLifecycle::renderer_mut);
                if let (Some(window), Some(renderer)) = (&self.window, renderer) {
                    let info = renderer.adapter_info();
                    tracing::info!("GPU initialized with {} backend", info.backend.to_str());
                    // The window may have changed size while init ran.
                    let size = window.inner_size();
                    if renderer.presentation().size() != (size.width, size.height) {
                        renderer.resize(size.width, size.height);
                    }
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut lifecycle) = self.lifecycle.take() {
                    lifecycle.unmount();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let Some(renderer) = self
                    .lifecycle
                    .as_mut()
                    .and_then(RendererLifecycle::renderer_mut)
                {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(lifecycle) = &mut self.lifecycle {
                    lifecycle.on_frame();
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    if cli.no_vsync {
        config.gpu.vsync = false;
    }

    let event_loop = EventLoop::<UserEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);
    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use godray_render::{FrameError, ManualRequester};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct TrackedRenderer {
        released: Arc<AtomicBool>,
    }

    impl FrameRenderer for TrackedRenderer {
        fn render_frame(&mut self) -> Result<(), FrameError> {
            Ok(())
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn late_init_after_close_is_released() {
        let mut lifecycle: RendererLifecycle<TrackedRenderer, ManualRequester> =
            RendererLifecycle::new(ManualRequester::new());
        let token = lifecycle.mount();
        lifecycle.unmount();
        drop(lifecycle);

        let renderer = TrackedRenderer::default();
        let released = renderer.released.clone();
        let state = deliver::<TrackedRenderer, ManualRequester>(None, token, Ok(renderer));
        assert_eq!(state, None);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn init_result_reaches_live_lifecycle() {
        let mut lifecycle = RendererLifecycle::new(ManualRequester::new());
        let token = lifecycle.mount();

        let renderer = TrackedRenderer::default();
        let released = renderer.released.clone();
        let state = deliver(Some(&mut lifecycle), token, Ok(renderer));
        assert_eq!(state, Some(LifecycleState::Running));
        assert!(!released.load(Ordering::SeqCst));

        lifecycle.unmount();
        assert!(released.load(Ordering::SeqCst));
    }
}
