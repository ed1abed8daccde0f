use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use godray_common::{IndexLayout, RenderConfig, StreakSettings};
use godray_geometry::SphereMesh;
use godray_render::{LifecycleState, ManualRequester, RendererLifecycle, TickOutcome, initialize};
use godray_render_wgpu::{Drawable, SceneRenderer, WgpuPlatform, WgpuSceneBuilder};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "godray-cli", about = "Inspect and render the light-streak scene")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML or JSON render configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    TriangleList,
    LegacyStrip,
}

impl From<LayoutArg> for IndexLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::TriangleList => IndexLayout::TriangleList,
            LayoutArg::LegacyStrip => IndexLayout::LegacyStrip,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the GPU adapters wgpu can see
    Info,
    /// Build the sphere mesh and print its statistics
    Mesh {
        #[arg(long)]
        lat_bands: Option<u32>,
        #[arg(long)]
        lon_bands: Option<u32>,
        #[arg(long)]
        radius: Option<f32>,
        #[arg(long, value_enum)]
        layout: Option<LayoutArg>,
    },
    /// Render frames without a window and save the last one as PNG
    Render {
        /// Output PNG path
        #[arg(short, long, default_value = "godray.png")]
        output: PathBuf,
        /// Number of frames to run through the frame loop
        #[arg(short, long, default_value = "1")]
        frames: u32,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Skip the light-streak effect and show the scene as rendered
        #[arg(long)]
        passthrough: bool,
    },
    /// Print the effective configuration as YAML
    Config,
}

fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(RenderConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("godray-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", godray_common::crate_info());
            println!("geometry: {}", godray_geometry::crate_info());
            println!("render: {}", godray_render::crate_info());
            println!("render-wgpu: {}", godray_render_wgpu::crate_info());

            let adapters = godray_render_wgpu::list_adapters();
            if adapters.is_empty() {
                println!("adapters: none");
            }
            for info in adapters {
                println!(
                    "adapter: {} ({}, {:?})",
                    info.name,
                    info.backend.to_str(),
                    info.device_type
                );
            }
        }
        Commands::Mesh {
            lat_bands,
            lon_bands,
            radius,
            layout,
        } => {
            let sphere = &mut config.sphere;
            sphere.lat_bands = lat_bands.unwrap_or(sphere.lat_bands);
            sphere.lon_bands = lon_bands.unwrap_or(sphere.lon_bands);
            sphere.radius = radius.unwrap_or(sphere.radius);
            if let Some(layout) = layout {
                sphere.index_layout = layout.into();
            }

            let start = Instant::now();
            let mesh = SphereMesh::from_settings(sphere)?;
            let elapsed = start.elapsed();

            println!(
                "sphere: lat={} lon={} radius={} layout={:?}",
                sphere.lat_bands, sphere.lon_bands, sphere.radius, sphere.index_layout
            );
            println!("vertices: {}", mesh.vertex_count());
            println!(
                "indices: {} (triangles: {}, leftover: {})",
                mesh.index_count(),
                mesh.index_count() / 3,
                mesh.index_count() % 3
            );
            println!(
                "bytes: positions={} indices={}",
                mesh.position_bytes().len(),
                mesh.index_bytes().len()
            );
            println!("built in {elapsed:?}");
        }
        Commands::Render {
            output,
            frames,
            width,
            height,
            passthrough,
        } => {
            config.width = width.unwrap_or(config.width);
            config.height = height.unwrap_or(config.height);
            if passthrough {
                config.streak = StreakSettings::passthrough();
            }
            config.validate()?;
            render_headless(config, frames.max(1), &output)?;
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}

/// Mount a headless renderer, pump `frames` frames through the lifecycle the
/// way a host event loop would, and save the final image.
fn render_headless(config: RenderConfig, frames: u32, output: &Path) -> Result<()> {
    let requester = ManualRequester::new();
    let mut lifecycle: RendererLifecycle<SceneRenderer, ManualRequester> =
        RendererLifecycle::new(requester.clone());
    let token = lifecycle.mount();

    let mut platform = WgpuPlatform::new(
        Drawable::Headless {
            width: config.width,
            height: config.height,
        },
        config.gpu,
    );
    let mut builder = WgpuSceneBuilder::new(config);
    let result = pollster::block_on(initialize(&mut platform, &mut builder));
    if lifecycle.complete(token, result) != LifecycleState::Running {
        let reason = lifecycle
            .last_error()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        anyhow::bail!("renderer failed to start: {reason}");
    }

    let start = Instant::now();
    let mut rendered = 0;
    let mut attempts = 0;
    // Dropped frames are retried, but not forever.
    while rendered < frames && attempts < frames.saturating_mul(4) && requester.take_request() {
        attempts += 1;
        match lifecycle.on_frame() {
            TickOutcome::Rendered => rendered += 1,
            TickOutcome::Dropped => {}
            TickOutcome::Idle | TickOutcome::Stopped => break,
        }
    }
    let elapsed = start.elapsed();

    let image = lifecycle
        .renderer_mut()
        .context("renderer not running")?
        .capture_output()?;
    let stats = lifecycle.stats().unwrap_or_default();
    lifecycle.unmount();

    let buffer = image::RgbaImage::from_raw(image.width, image.height, image.data)
        .context("captured image has unexpected size")?;
    buffer
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "rendered {} frames ({} dropped) in {elapsed:?} -> {}",
        stats.submitted,
        stats.dropped,
        output.display()
    );
    Ok(())
}
