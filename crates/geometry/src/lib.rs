//! Procedural geometry for the scene pass.
//!
//! # Invariants
//! - Generation is pure: identical arguments give bit-identical meshes.
//! - Every index is smaller than the vertex count and fits in 16 bits.

mod sphere;

pub use sphere::{GeometryError, MAX_VERTICES, SphereMesh, build_sphere, build_sphere_with_layout};

pub fn crate_info() -> &'static str {
    "godray-geometry v0.1.0"
}
