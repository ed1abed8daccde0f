//! CPU mirrors of the shader math.
//!
//! These follow the WGSL in the wgpu backend line for line and are used to
//! check the effect parameters without a GPU.

use glam::{Vec2, Vec3};
use godray_common::{CloudSettings, StreakSettings};

/// WGSL `fract`: `x - floor(x)`, which differs from `f32::fract` for negatives.
fn wgsl_fract(x: f32) -> f32 {
    x - x.floor()
}

pub fn smoothstep(low: f32, high: f32, x: f32) -> f32 {
    let t = ((x - low) / (high - low)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Sine hash of a position, in `[0, 1)`.
pub fn hash(p: Vec3) -> f32 {
    wgsl_fract((p.dot(Vec3::new(12.9898, 78.233, 37.719))).sin() * 43758.5453)
}

/// Scene fragment color for a local-space position.
pub fn cloud_color(local: Vec3, clouds: &CloudSettings) -> Vec3 {
    let n = hash(local * clouds.frequency);
    let mask = smoothstep(clouds.low, clouds.high, n);
    clouds.dark.lerp(clouds.light, mask)
}

/// Post fragment color at `uv`, reading the offscreen image through `sample`.
pub fn light_streak(sample: impl Fn(Vec2) -> Vec3, uv: Vec2, streak: &StreakSettings) -> Vec3 {
    let base = sample(uv);
    let delta = (streak.light_pos - uv) / streak.samples.max(1) as f32;
    let mut result = base;
    let mut coord = uv;
    let mut illum = 1.0;
    for _ in 0..streak.samples {
        coord += delta;
        result += sample(coord) * illum;
        illum *= streak.decay;
    }
    result * streak.exposure + base * streak.base_weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_input_matches_closed_form() {
        let streak = StreakSettings::default();
        let color = Vec3::new(0.2, 0.5, 1.0);
        let illum_sum: f32 = (0..30).map(|i| 0.92_f32.powi(i)).sum();
        let gain = (1.0 + illum_sum) * 0.25 + 0.6;

        for uv in [Vec2::ZERO, Vec2::new(0.5, 0.45), Vec2::new(0.9, 0.1)] {
            let out = light_streak(|_| color, uv, &streak);
            assert!(out.abs_diff_eq(color * gain, 1e-4), "{out} at {uv}");
        }
        assert!((streak.uniform_gain() - gain).abs() < 1e-4);
    }

    #[test]
    fn passthrough_reproduces_input() {
        let streak = StreakSettings::passthrough();
        let image = |uv: Vec2| Vec3::new(uv.x, uv.y, 0.25);
        let uv = Vec2::new(0.3, 0.7);
        assert!(light_streak(image, uv, &streak).abs_diff_eq(image(uv), 1e-6));
    }

    #[test]
    fn taps_march_toward_light() {
        let streak = StreakSettings {
            samples: 4,
            ..StreakSettings::default()
        };
        let uv = Vec2::new(0.1, 0.05);
        let last = std::cell::Cell::new(Vec2::ZERO);
        light_streak(
            |coord| {
                last.set(coord);
                Vec3::ZERO
            },
            uv,
            &streak,
        );
        assert!(last.get().abs_diff_eq(streak.light_pos, 1e-6));
    }

    #[test]
    fn bright_spot_streaks_outward() {
        // A bright spot at the light position reaches distant pixels through
        // their last few taps; the spot itself stays brightest.
        let streak = StreakSettings::default();
        let image = |coord: Vec2| {
            if coord.distance(streak.light_pos) < 0.02 {
                Vec3::ONE
            } else {
                Vec3::ZERO
            }
        };
        let toward = light_streak(image, Vec2::new(0.5, 0.95), &streak);
        assert!(toward.x > 0.0);
        let at_light = light_streak(image, streak.light_pos, &streak);
        assert!(at_light.x > toward.x);
    }

    #[test]
    fn hash_range() {
        for i in 0..200 {
            let p = Vec3::new(i as f32 * 0.37, -(i as f32) * 0.11, i as f32 * 1.3);
            let h = hash(p);
            assert!((0.0..1.0).contains(&h), "{h}");
        }
    }

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(0.35, 0.65, 0.1), 0.0);
        assert_eq!(smoothstep(0.35, 0.65, 0.9), 1.0);
        assert!((smoothstep(0.35, 0.65, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cloud_color_between_endpoints() {
        let clouds = CloudSettings::default();
        for i in 0..50 {
            let c = cloud_color(Vec3::new(i as f32 * 0.1, 0.3, -0.2), &clouds);
            assert!(c.cmpge(clouds.dark - 1e-6).all() && c.cmple(clouds.light + 1e-6).all());
        }
    }
}
