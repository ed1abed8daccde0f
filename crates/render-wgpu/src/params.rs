use bytemuck::{Pod, Zeroable};
use godray_common::{CloudSettings, StreakSettings};

/// Scene-pass uniform block. Layout matches `CloudParams` in the scene shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CloudUniforms {
    pub dark: [f32; 4],
    pub light: [f32; 4],
    pub scale: f32,
    pub frequency: f32,
    pub low: f32,
    pub high: f32,
}

impl CloudUniforms {
    pub fn from_settings(clouds: &CloudSettings) -> Self {
        Self {
            dark: clouds.dark.extend(1.0).to_array(),
            light: clouds.light.extend(1.0).to_array(),
            scale: clouds.scale,
            frequency: clouds.frequency,
            low: clouds.low,
            high: clouds.high,
        }
    }
}

/// Post-pass uniform block. Layout matches `StreakParams` in the post shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct StreakUniforms {
    pub light_pos: [f32; 2],
    pub samples: u32,
    pub decay: f32,
    pub exposure: f32,
    pub base_weight: f32,
    pub _pad: [f32; 2],
}

impl StreakUniforms {
    pub fn from_settings(streak: &StreakSettings) -> Self {
        Self {
            light_pos: streak.light_pos.to_array(),
            samples: streak.samples,
            decay: streak.decay,
            exposure: streak.exposure,
            base_weight: streak.base_weight,
            _pad: [0.0; 2],
        }
    }
}
