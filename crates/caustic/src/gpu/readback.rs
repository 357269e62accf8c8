//! Blocking texture readback for tests and tooling.
//!
//! Copies a texture into a staging buffer with rows padded to
//! `COPY_BYTES_PER_ROW_ALIGNMENT`, waits for the map and unpacks the texels
//! into `f32` channels (row-major, channels interleaved).

use std::sync::atomic::AtomicBool;
use std::sync::mpsc;

use super::{await_buffer_map, GpuError, SimulationContext};

/// Bytes per texel and channel count for the formats the passes produce.
fn texel_layout(format: wgpu::TextureFormat) -> Result<(u32, usize), GpuError> {
    match format {
        wgpu::TextureFormat::R32Float => Ok((4, 1)),
        wgpu::TextureFormat::Rgba16Float => Ok((8, 4)),
        wgpu::TextureFormat::Rgba32Float => Ok((16, 4)),
        other => Err(GpuError::UnsupportedFormat(other)),
    }
}

fn padded_row_bytes(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Read every texel channel of `texture` as `f32`.
///
/// Supports `R32Float`, `Rgba16Float` and `Rgba32Float`. Blocks until the GPU
/// has finished all previously submitted work.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<f32>, GpuError> {
    read_texture_tracked(device, queue, texture, &AtomicBool::new(false))
}

pub(crate) fn read_texture_tracked(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    device_lost: &AtomicBool,
) -> Result<Vec<f32>, GpuError> {
    let format = texture.format();
    let (texel_bytes, channels) = texel_layout(format)?;
    let width = texture.width();
    let height = texture.height();

    let unpadded_bytes_per_row = width * texel_bytes;
    let padded_bytes_per_row = padded_row_bytes(unpadded_bytes_per_row);

    let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Readback Staging"),
        size: (padded_bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    await_buffer_map(rx, device_lost)?;

    let mut texels = Vec::with_capacity(width as usize * height as usize * channels);
    {
        let data = buffer_slice.get_mapped_range();
        for row in 0..height as usize {
            let start = row * padded_bytes_per_row as usize;
            let bytes = &data[start..start + unpadded_bytes_per_row as usize];
            match format {
                wgpu::TextureFormat::Rgba16Float => {
                    texels.extend(
                        bytes
                            .chunks_exact(2)
                            .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32()),
                    );
                }
                _ => {
                    texels.extend(
                        bytes
                            .chunks_exact(4)
                            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                    );
                }
            }
        }
    }
    staging_buffer.unmap();

    Ok(texels)
}

impl SimulationContext {
    /// [`read_texture`] on this context's device, sharing its lost flag.
    pub fn read_texture(&self, texture: &wgpu::Texture) -> Result<Vec<f32>, GpuError> {
        read_texture_tracked(&self.device, &self.queue, texture, self.device_lost_flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        assert_eq!(padded_row_bytes(4), 256);
        assert_eq!(padded_row_bytes(256), 256);
        assert_eq!(padded_row_bytes(128 * 8), 1024);
        assert_eq!(padded_row_bytes(130 * 4), 768);
    }

    #[test]
    fn test_unsupported_format_rejected() {
        assert!(matches!(
            texel_layout(wgpu::TextureFormat::Rgba8Unorm),
            Err(GpuError::UnsupportedFormat(_))
        ));
        assert_eq!(texel_layout(wgpu::TextureFormat::R32Float).ok(), Some((4, 1)));
    }
}
