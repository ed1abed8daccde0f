//! Shared configuration for the godray renderer.
//!
//! # Invariants
//! - Every artistic constant used by the shaders has a named field here.
//! - A config that passes `validate()` can always be uploaded to the GPU.

mod config;

pub use config::{
    ConfigError, CloudSettings, GpuSettings, IndexLayout, PowerPreference, RenderConfig,
    SphereSettings, StreakSettings, MAX_STREAK_SAMPLES,
};

pub fn crate_info() -> &'static str {
    "godray-common v0.1.0"
}
