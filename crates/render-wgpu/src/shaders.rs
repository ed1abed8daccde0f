/// WGSL for the scene pass: sphere positions in, procedural cloud shading out.
pub const SCENE_SHADER: &str = r#"
struct CloudParams {
    dark: vec4<f32>,
    light: vec4<f32>,
    scale: f32,
    frequency: f32,
    low: f32,
    high: f32,
};

@group(0) @binding(0)
var<uniform> clouds: CloudParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local_position: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position * clouds.scale, 1.0);
    out.local_position = position;
    return out;
}

fn hash(p: vec3<f32>) -> f32 {
    return fract(sin(dot(p, vec3<f32>(12.9898, 78.233, 37.719))) * 43758.5453);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = hash(in.local_position * clouds.frequency);
    let mask = smoothstep(clouds.low, clouds.high, n);
    let color = mix(clouds.dark.rgb, clouds.light.rgb, mask);
    return vec4<f32>(color, 1.0);
}
"#;

/// WGSL for the post pass: full-screen quad from `vertex_index`, radial
/// light-streak accumulation over the offscreen image.
pub const POST_SHADER: &str = r#"
struct StreakParams {
    light_pos: vec2<f32>,
    samples: u32,
    decay: f32,
    exposure: f32,
    base_weight: f32,
    pad0: vec2<f32>,
};

@group(0) @binding(0)
var scene_sampler: sampler;
@group(0) @binding(1)
var scene_texture: texture_2d<f32>;
@group(0) @binding(2)
var<uniform> streak: StreakParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
    );
    let pos = positions[index];
    var out: VertexOutput;
    out.clip_position = vec4<f32>(pos, 0.0, 1.0);
    out.uv = (pos + vec2<f32>(1.0, 1.0)) * 0.5;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = textureSample(scene_texture, scene_sampler, in.uv).rgb;
    let delta = (streak.light_pos - in.uv) / f32(max(streak.samples, 1u));
    var result = base;
    var coord = in.uv;
    var illum = 1.0;
    for (var i = 0u; i < streak.samples; i = i + 1u) {
        coord = coord + delta;
        result = result + textureSample(scene_texture, scene_sampler, coord).rgb * illum;
        illum = illum * streak.decay;
    }
    result = result * streak.exposure + base * streak.base_weight;
    return vec4<f32>(result, 1.0);
}
"#;

/// Number of vertices the post pass draws.
pub const FULLSCREEN_VERTICES: u32 = 6;

/// WGSL text for the scene and post pipelines. Each must keep the entry
/// points and bindings of the built-in shaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub scene: String,
    pub post: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            scene: SCENE_SHADER.to_string(),
            post: POST_SHADER.to_string(),
        }
    }
}
