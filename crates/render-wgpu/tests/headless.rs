//! End-to-end rendering against a real adapter. Every test returns early
//! when the machine has no usable GPU.

use glam::Vec3;
use godray_common::{RenderConfig, StreakSettings};
use godray_render::{
    FrameError, FrameRenderer, FrameScheduler, InitError, LifecycleState, ManualRequester,
    RendererLifecycle, ScheduleMode, StopHandle, TickOutcome, acquire, initialize,
};
use godray_render_wgpu::{
    Drawable, PipelineSet, ResourceFactory, SceneRenderer, ShaderSources, WgpuPlatform,
    WgpuSceneBuilder,
};

fn headless_platform(config: &RenderConfig) -> WgpuPlatform {
    WgpuPlatform::new(
        Drawable::Headless {
            width: config.width,
            height: config.height,
        },
        config.gpu,
    )
}

/// Run initialization; `None` when the machine has no usable adapter.
fn try_build(
    config: &RenderConfig,
    builder: WgpuSceneBuilder,
) -> Option<Result<SceneRenderer, InitError>> {
    let mut platform = headless_platform(config);
    let mut builder = builder;
    match pollster::block_on(initialize(&mut platform, &mut builder)) {
        Err(InitError::UnsupportedPlatform | InitError::NoAdapter) => {
            eprintln!("skipping: no GPU adapter available");
            None
        }
        result => Some(result),
    }
}

fn headless(config: &RenderConfig) -> Option<SceneRenderer> {
    match try_build(config, WgpuSceneBuilder::new(config.clone()))? {
        Ok(renderer) => Some(renderer),
        Err(err) => panic!("initialization failed: {err}"),
    }
}

/// Drive `frames` frames through the scheduler and hand the renderer back.
fn run_frames(renderer: SceneRenderer, frames: usize) -> SceneRenderer {
    let requester = ManualRequester::new();
    let mut scheduler = FrameScheduler::new(renderer, requester.clone(), StopHandle::new());
    scheduler.set_mode(ScheduleMode::Always);
    for _ in 0..frames {
        assert!(requester.take_request());
        assert_eq!(scheduler.tick(), TickOutcome::Rendered);
    }
    scheduler.into_renderer()
}

#[test]
fn scene_and_streak_pass_produce_an_image() {
    let config = RenderConfig::default();
    assert_eq!((config.width, config.height), (800, 600));
    let Some(renderer) = headless(&config) else {
        return;
    };
    let mut renderer = run_frames(renderer, 1);

    let offscreen = renderer.capture_offscreen().expect("offscreen readback");
    assert_eq!((offscreen.width, offscreen.height), (800, 600));
    let lit = offscreen
        .to_rgba_f32()
        .expect("offscreen target is half float")
        .iter()
        .filter(|texel| texel[..3].iter().any(|c| *c != 0.0))
        .count();
    assert!(lit > 0, "offscreen target still holds the clear color");

    let streaked = renderer.capture_output().expect("output readback");
    renderer.release();

    let passthrough_config = RenderConfig {
        streak: StreakSettings::passthrough(),
        ..config
    };
    let Some(passthrough) = headless(&passthrough_config) else {
        return;
    };
    let mut passthrough = run_frames(passthrough, 1);
    let plain = passthrough.capture_output().expect("output readback");
    passthrough.release();

    assert_eq!(streaked.data.len(), plain.data.len());
    assert_ne!(streaked.data, plain.data, "light streak had no effect");
}

#[test]
fn center_texel_is_sphere_colored() {
    let Some(renderer) = headless(&RenderConfig::default()) else {
        return;
    };
    let mut renderer = run_frames(renderer, 1);
    let offscreen = renderer.capture_offscreen().expect("offscreen readback");
    let texel = offscreen.rgba_f32_at(400, 300).expect("center texel");
    // The cloud colors are bounded by the dark and light endpoints.
    assert!(texel[..3].iter().all(|c| (0.07..=1.01).contains(c)), "{texel:?}");
    assert!(offscreen.rgba_f32_at(800, 300).is_none());
    renderer.release();
}

#[test]
fn release_returns_every_resource() {
    let Some(renderer) = headless(&RenderConfig::default()) else {
        return;
    };
    let mut renderer = run_frames(renderer, 3);
    assert!(renderer.ledger().live() > 0);

    renderer.release();
    assert_eq!(renderer.ledger().live(), 0);
    assert!(renderer.is_released());
    assert_eq!(renderer.render_frame(), Err(FrameError::Released));
}

#[test]
fn resize_rebuilds_targets() {
    let Some(mut renderer) = headless(&RenderConfig::default()) else {
        return;
    };
    renderer.resize(320, 240);
    assert_eq!(renderer.presentation().size(), (320, 240));
    let mut renderer = run_frames(renderer, 2);

    let output = renderer.capture_output().expect("output readback");
    assert_eq!((output.width, output.height), (320, 240));
    let offscreen = renderer.capture_offscreen().expect("offscreen readback");
    assert_eq!((offscreen.width, offscreen.height), (320, 240));
    renderer.release();
    assert_eq!(renderer.ledger().live(), 0);
}

#[test]
fn stopped_loop_submits_nothing() {
    let Some(renderer) = headless(&RenderConfig::default()) else {
        return;
    };
    let requester = ManualRequester::new();
    let stop = StopHandle::new();
    let mut scheduler = FrameScheduler::new(renderer, requester.clone(), stop.clone());
    scheduler.set_mode(ScheduleMode::Always);
    for _ in 0..2 {
        assert!(requester.take_request());
        scheduler.tick();
    }
    stop.stop();
    for _ in 0..5 {
        assert_eq!(scheduler.tick(), TickOutcome::Stopped);
    }
    assert_eq!(scheduler.stats().submitted, 2);
    let mut renderer = scheduler.into_renderer();
    renderer.release();
}

#[test]
fn uniform_scene_is_scaled_by_streak_gain() {
    // One flat color everywhere the sphere covers.
    let c = 0.1;
    let mut config = RenderConfig::default();
    config.clouds.dark = Vec3::splat(c);
    config.clouds.light = Vec3::splat(c);
    let Some(renderer) = headless(&config) else {
        return;
    };
    let mut renderer = run_frames(renderer, 1);
    let output = renderer.capture_output().expect("output readback");
    renderer.release();

    // The sphere spans a disk of radius radius * scale in clip space, so
    // radius * scale / 2 in UV. Taps march toward the light, which sits
    // inside that disk, so every tap of an inner texel reads `c`.
    let covered = config.sphere.radius * config.clouds.scale / 2.0;
    let inner = covered * 0.75;
    assert!((config.streak.light_pos - glam::Vec2::splat(0.5)).length() < inner);

    let stored = half::f16::from_f32(c).to_f32();
    let expected = stored * config.streak.uniform_gain();
    assert!(expected < 1.0, "output would clamp");
    let expected_byte = expected * 255.0;

    let mut checked = 0;
    for y in 0..output.height {
        for x in 0..output.width {
            let u = (x as f32 + 0.5) / output.width as f32 - 0.5;
            let v = (y as f32 + 0.5) / output.height as f32 - 0.5;
            if (u * u + v * v).sqrt() > inner {
                continue;
            }
            let texel = output.texel(x, y).expect("in bounds");
            for channel in &texel[..3] {
                assert!(
                    (f32::from(*channel) - expected_byte).abs() <= 1.5,
                    "texel ({x}, {y}) = {texel:?}, expected {expected_byte}"
                );
            }
            checked += 1;
        }
    }
    assert!(checked > 10_000, "only {checked} texels inside the sphere");
}

#[test]
fn malformed_post_shader_fails_initialization() {
    let config = RenderConfig::default();
    let mut platform = headless_platform(&config);
    let acquired = match pollster::block_on(acquire(&mut platform)) {
        Ok(acquired) => acquired,
        Err(InitError::UnsupportedPlatform | InitError::NoAdapter) => return,
        Err(err) => panic!("acquisition failed: {err}"),
    };
    let sources = ShaderSources {
        post: "fn fs_main( -> {".to_string(),
        ..ShaderSources::default()
    };

    let mut factory = ResourceFactory::new();
    let result = pollster::block_on(PipelineSet::new(
        &acquired.device.device,
        &mut factory,
        acquired.presentation.format(),
        &sources,
    ));
    assert!(
        matches!(result, Err(InitError::PipelineCreation { pipeline: "post", .. })),
        "unexpected result: {:?}",
        result.err()
    );
    // The scene module compiled fine and was handed back as well.
    assert_eq!(factory.ledger().shader_modules, 0);
    assert_eq!(factory.ledger().live(), 0);
}

#[test]
fn shader_failure_never_starts_the_loop() {
    let config = RenderConfig::default();
    let builder = WgpuSceneBuilder::new(config.clone()).with_shaders(ShaderSources {
        scene: "not wgsl at all".to_string(),
        ..ShaderSources::default()
    });
    let Some(result) = try_build(&config, builder) else {
        return;
    };

    let requester = ManualRequester::new();
    let mut lifecycle = RendererLifecycle::new(requester.clone());
    let token = lifecycle.mount();
    assert_eq!(lifecycle.complete(token, result), LifecycleState::Failed);
    assert!(matches!(
        lifecycle.last_error(),
        Some(InitError::PipelineCreation { pipeline: "scene", .. })
    ));
    assert_eq!(lifecycle.on_frame(), TickOutcome::Idle);
    assert_eq!(requester.total(), 0);
}

#[test]
fn unbounded_streak_is_rejected() {
    let mut config = RenderConfig::default();
    config.streak.samples = u32::MAX;
    let Some(result) = try_build(&config, WgpuSceneBuilder::new(config.clone())) else {
        return;
    };
    assert!(matches!(result.err(), Some(InitError::InvalidScene(_))));

    let Some(mut renderer) = headless(&RenderConfig::default()) else {
        return;
    };
    let growing = StreakSettings {
        decay: 1.5,
        ..StreakSettings::default()
    };
    assert!(renderer.set_streak(&growing).is_err());
    assert!(renderer.set_streak(&StreakSettings::passthrough()).is_ok());
    renderer.release();
}
