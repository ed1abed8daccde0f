use glam::DVec3;
use godray_common::{IndexLayout, SphereSettings};

/// Largest vertex count addressable with `u16` indices.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Errors from sphere generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("sphere needs at least one latitude and one longitude band, got {lat}x{lon}")]
    ZeroBands { lat: u32, lon: u32 },
    #[error("sphere radius must be finite and positive, got {0}")]
    InvalidRadius(f32),
    #[error("{lat}x{lon} bands need {count} vertices, 16-bit indices allow {MAX_VERTICES}")]
    TooManyVertices { lat: u32, lon: u32, count: usize },
}

/// A triangulated UV sphere: tightly packed `float32x3` positions plus `u16` indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereMesh {
    positions: Vec<[f32; 3]>,
    indices: Vec<u16>,
    layout: IndexLayout,
}

impl SphereMesh {
    /// Build from tessellation settings.
    pub fn from_settings(settings: &SphereSettings) -> Result<Self, GeometryError> {
        build_sphere_with_layout(
            settings.lat_bands,
            settings.lon_bands,
            settings.radius,
            settings.index_layout,
        )
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn layout(&self) -> IndexLayout {
        self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Position data as raw bytes (stride 12).
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Build a sphere with the default two-triangles-per-cell index layout.
pub fn build_sphere(lat_bands: u32, lon_bands: u32, radius: f32) -> Result<SphereMesh, GeometryError> {
    build_sphere_with_layout(lat_bands, lon_bands, radius, IndexLayout::TriangleList)
}

/// Sample the unit sphere on a `(lat_bands + 1) x (lon_bands + 1)` grid.
///
/// The extra row and column duplicate the poles and the longitude seam so no
/// cell has to wrap around.
pub fn build_sphere_with_layout(
    lat_bands: u32,
    lon_bands: u32,
    radius: f32,
    layout: IndexLayout,
) -> Result<SphereMesh, GeometryError> {
    if lat_bands == 0 || lon_bands == 0 {
        return Err(GeometryError::ZeroBands {
            lat: lat_bands,
            lon: lon_bands,
        });
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(GeometryError::InvalidRadius(radius));
    }
    let count = (lat_bands as usize + 1) * (lon_bands as usize + 1);
    if count > MAX_VERTICES {
        return Err(GeometryError::TooManyVertices {
            lat: lat_bands,
            lon: lon_bands,
            count,
        });
    }

    let mut positions = Vec::with_capacity(count);
    for lat in 0..=lat_bands {
        let theta = f64::from(lat) * std::f64::consts::PI / f64::from(lat_bands);
        let (sin_theta, cos_theta) = theta.sin_cos();
        for lon in 0..=lon_bands {
            let phi = f64::from(lon) * 2.0 * std::f64::consts::PI / f64::from(lon_bands);
            let (sin_phi, cos_phi) = phi.sin_cos();
            let p = DVec3::new(cos_phi * sin_theta, cos_theta, sin_phi * sin_theta)
                * f64::from(radius);
            positions.push(p.as_vec3().to_array());
        }
    }

    let per_cell = match layout {
        IndexLayout::TriangleList => 6,
        IndexLayout::LegacyStrip => 5,
    };
    let mut indices = Vec::with_capacity(lat_bands as usize * lon_bands as usize * per_cell);
    // count <= MAX_VERTICES, so every index below fits in u16.
    for lat in 0..lat_bands {
        for lon in 0..lon_bands {
            let first = (lat * (lon_bands + 1) + lon) as u16;
            let second = first + lon_bands as u16 + 1;
            match layout {
                IndexLayout::TriangleList => indices.extend_from_slice(&[
                    first,
                    second,
                    first + 1,
                    second,
                    second + 1,
                    first + 1,
                ]),
                IndexLayout::LegacyStrip => indices.extend_from_slice(&[
                    first,
                    second,
                    first + 1,
                    second + 1,
                    first + 1,
                ]),
            }
        }
    }

    tracing::trace!(
        lat_bands,
        lon_bands,
        vertices = positions.len(),
        indices = indices.len(),
        ?layout,
        "built sphere"
    );

    Ok(SphereMesh {
        positions,
        indices,
        layout,
    })
}
