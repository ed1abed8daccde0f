//! Texture readback for headless rendering and tests.

use std::sync::mpsc;

use crate::context::GpuDevice;
use crate::resources::ResourceFactory;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("texture format {0:?} cannot be copied to a buffer")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("nothing to capture: {0}")]
    NoSource(&'static str),
    #[error("buffer mapping failed: {0}")]
    Map(String),
}

/// Tightly packed pixel rows read back from a texture.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub data: Vec<u8>,
}

impl CapturedImage {
    pub fn bytes_per_texel(&self) -> usize {
        self.data.len() / (self.width as usize * self.height as usize).max(1)
    }

    /// Texel at `(x, y)` as raw bytes, `None` outside the image.
    pub fn texel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let size = self.bytes_per_texel();
        let start = (y as usize * self.width as usize + x as usize) * size;
        self.data.get(start..start + size)
    }

    /// Decode an `Rgba16Float` image to `f32` channels. `None` for any other
    /// format.
    pub fn to_rgba_f32(&self) -> Option<Vec<[f32; 4]>> {
        (self.format == wgpu::TextureFormat::Rgba16Float)
            .then(|| self.data.chunks_exact(8).map(decode_rgba16f).collect())
    }

    /// One `Rgba16Float` texel decoded to `f32` channels.
    pub fn rgba_f32_at(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if self.format != wgpu::TextureFormat::Rgba16Float {
            return None;
        }
        self.texel(x, y).map(decode_rgba16f)
    }
}

fn decode_rgba16f(texel: &[u8]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (channel, bytes) in out.iter_mut().zip(texel.chunks_exact(2)) {
        *channel = half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32();
    }
    out
}

/// Row pitch for a copy, padded to the 256-byte copy alignment.
pub fn padded_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let unpadded = width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copy a whole texture into CPU memory. Blocks until the GPU is done.
pub fn read_texture(
    gpu: &GpuDevice,
    factory: &mut ResourceFactory,
    texture: &wgpu::Texture,
) -> Result<CapturedImage, CaptureError> {
    let format = texture.format();
    let bytes_per_texel = format
        .block_copy_size(None)
        .ok_or(CaptureError::UnsupportedFormat(format))?;
    let (width, height) = (texture.width(), texture.height());
    let padded = padded_bytes_per_row(width, bytes_per_texel);
    let readback = factory.readback(&gpu.device, "capture_readback", u64::from(padded) * u64::from(height));

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("capture_encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: readback.raw(),
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice();
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = gpu.device.poll(wgpu::Maintain::Wait);

    let mapped = rx
        .recv()
        .map_err(|err| CaptureError::Map(err.to_string()))
        .and_then(|result| result.map_err(|err| CaptureError::Map(err.to_string())));
    if let Err(err) = mapped {
        factory.release_buffer(readback);
        return Err(err);
    }

    let row = (width * bytes_per_texel) as usize;
    let mut data = Vec::with_capacity(row * height as usize);
    {
        let view = slice.get_mapped_range();
        for chunk in view.chunks(padded as usize).take(height as usize) {
            data.extend_from_slice(&chunk[..row]);
        }
    }
    readback.raw().unmap();
    factory.release_buffer(readback);

    tracing::debug!(width, height, ?format, "texture captured");
    Ok(CapturedImage {
        width,
        height,
        format,
        data,
    })
}
