use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on light-streak taps; keeps the post shader loop bounded.
pub const MAX_STREAK_SAMPLES: u32 = 128;

/// Errors from loading or validating a render config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0:?} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How sphere grid cells are turned into indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexLayout {
    /// Two triangles per cell.
    #[default]
    TriangleList,
    /// Five indices per cell (`first, second, first+1, second+1, first+1`).
    /// Not a valid triangle list; kept to reproduce the old artifact.
    LegacyStrip,
}

/// Sphere tessellation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereSettings {
    pub lat_bands: u32,
    pub lon_bands: u32,
    pub radius: f32,
    pub index_layout: IndexLayout,
}

impl Default for SphereSettings {
    fn default() -> Self {
        Self {
            lat_bands: 64,
            lon_bands: 64,
            radius: 0.9,
            index_layout: IndexLayout::TriangleList,
        }
    }
}

/// Procedural "cloud" shading used by the scene pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    /// Uniform scale applied to positions in the vertex stage.
    pub scale: f32,
    /// Multiplier on local-space position before hashing.
    pub frequency: f32,
    /// Lower smoothstep edge.
    pub low: f32,
    /// Upper smoothstep edge.
    pub high: f32,
    pub dark: Vec3,
    pub light: Vec3,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            scale: 0.7,
            frequency: 6.0,
            low: 0.35,
            high: 0.65,
            dark: Vec3::new(0.08, 0.1, 0.14),
            light: Vec3::new(0.9, 0.92, 1.0),
        }
    }
}

/// Radial light-streak parameters used by the post pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreakSettings {
    /// Number of taps marched toward `light_pos`.
    pub samples: u32,
    /// Per-tap multiplier on the illumination weight.
    pub decay: f32,
    /// Scale applied to the accumulated streak.
    pub exposure: f32,
    /// Weight of the unstreaked sample added after exposure.
    pub base_weight: f32,
    /// Light position in UV space.
    pub light_pos: Vec2,
}

impl Default for StreakSettings {
    fn default() -> Self {
        Self {
            samples: 30,
            decay: 0.92,
            exposure: 0.25,
            base_weight: 0.6,
            light_pos: Vec2::new(0.5, 0.45),
        }
    }
}

impl StreakSettings {
    /// Settings under which the post pass reproduces its input unchanged.
    pub fn passthrough() -> Self {
        Self {
            samples: 0,
            exposure: 0.0,
            base_weight: 1.0,
            ..Self::default()
        }
    }

    /// Sum of the illumination weights over all taps: `Σ decay^i, i < samples`.
    pub fn illumination_sum(&self) -> f32 {
        let mut illum = 1.0_f32;
        let mut sum = 0.0_f32;
        for _ in 0..self.samples {
            sum += illum;
            illum *= self.decay;
        }
        sum
    }

    /// Factor a uniformly colored input is multiplied by.
    pub fn uniform_gain(&self) -> f32 {
        (1.0 + self.illumination_sum()) * self.exposure + self.base_weight
    }

    /// Reject settings the post shader cannot run in bounded time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples > MAX_STREAK_SAMPLES {
            return Err(ConfigError::Invalid(format!(
                "streak samples {} exceeds maximum {MAX_STREAK_SAMPLES}",
                self.samples
            )));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "streak decay must be in (0, 1], got {}",
                self.decay
            )));
        }
        if !(self.exposure.is_finite() && self.base_weight.is_finite()) {
            return Err(ConfigError::Invalid("streak weights must be finite".into()));
        }
        Ok(())
    }
}

/// Adapter selection hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    None,
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuSettings {
    pub power_preference: PowerPreference,
    pub vsync: bool,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            power_preference: PowerPreference::High,
            vsync: true,
        }
    }
}

/// Everything needed to build one renderer instance.
///
/// `width` and `height` are fixed for the lifetime of a renderer; hosts that
/// resize go through the renderer's resize hook instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub sphere: SphereSettings,
    pub clouds: CloudSettings,
    pub streak: StreakSettings,
    pub gpu: GpuSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            sphere: SphereSettings::default(),
            clouds: CloudSettings::default(),
            streak: StreakSettings::default(),
            gpu: GpuSettings::default(),
        }
    }
}

impl RenderConfig {
    /// Load a config from a `.yaml`/`.yml` or `.json` file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let config: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            "json" => serde_json::from_str(&text)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded render config");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "surface size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.sphere.lat_bands == 0 || self.sphere.lon_bands == 0 {
            return Err(ConfigError::Invalid(
                "sphere bands must be at least 1".into(),
            ));
        }
        let vertices = (self.sphere.lat_bands as u64 + 1) * (self.sphere.lon_bands as u64 + 1);
        if vertices > u64::from(u16::MAX) + 1 {
            return Err(ConfigError::Invalid(format!(
                "{}x{} sphere bands need {vertices} vertices, more than 16-bit indices allow",
                self.sphere.lat_bands, self.sphere.lon_bands
            )));
        }
        if !(self.sphere.radius.is_finite() && self.sphere.radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sphere radius must be positive, got {}",
                self.sphere.radius
            )));
        }
        self.streak.validate()?;
        if self.clouds.low >= self.clouds.high {
            return Err(ConfigError::Invalid(format!(
                "cloud thresholds must satisfy low < high, got {} >= {}",
                self.clouds.low, self.clouds.high
            )));
        }
        Ok(())
    }
}
