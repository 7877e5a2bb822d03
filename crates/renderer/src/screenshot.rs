//! Frame capture: copies a rendered texture to a PNG file or back to the CPU.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("surface does not allow copies (COPY_SRC usage unsupported)")]
    UnsupportedUsage,
    #[error("cannot capture surface format {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("failed to map readback buffer: {0}")]
    Map(String),
    #[error("failed to write {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Row pitch for a texture-to-buffer copy of `width` RGBA8 texels.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip row padding and reorder channels to tightly packed RGBA8.
pub fn to_rgba(data: &[u8], width: u32, height: u32, padded_row: u32, bgra: bool) -> Vec<u8> {
    let row = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for chunk in data.chunks(padded_row as usize).take(height as usize) {
        pixels.extend_from_slice(&chunk[..row]);
    }
    if bgra {
        for texel in pixels.chunks_exact_mut(4) {
            texel.swap(0, 2);
        }
    }
    pixels
}

fn is_bgra(format: wgpu::TextureFormat) -> Result<bool, ScreenshotError> {
    match format {
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => Ok(true),
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(false),
        other => Err(ScreenshotError::UnsupportedFormat(other)),
    }
}

/// A pending capture: the readback buffer a frame was copied into.
pub struct ScreenshotCapture {
    path: PathBuf,
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row: u32,
    bgra: bool,
}

impl ScreenshotCapture {
    /// Record a copy of `texture` into a new readback buffer.
    pub fn encode_copy(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        path: &Path,
    ) -> Result<Self, ScreenshotError> {
        if !texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
            return Err(ScreenshotError::UnsupportedUsage);
        }
        let bgra = is_bgra(texture.format())?;
        let (width, height) = (texture.width(), texture.height());
        let padded_row = padded_bytes_per_row(width);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Screenshot Buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );

        Ok(Self {
            path: path.to_path_buf(),
            buffer,
            width,
            height,
            padded_row,
            bgra,
        })
    }

    /// Wait for the copy to finish and return tightly packed RGBA8 pixels.
    /// Call after the copy was submitted.
    pub fn read_rgba(&self, device: &wgpu::Device) -> Result<Vec<u8>, ScreenshotError> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| ScreenshotError::Map(e.to_string()))?
            .map_err(|e| ScreenshotError::Map(e.to_string()))?;

        let pixels = {
            let data = slice.get_mapped_range();
            to_rgba(&data, self.width, self.height, self.padded_row, self.bgra)
        };
        self.buffer.unmap();
        Ok(pixels)
    }

    /// Wait for the copy to finish and write the PNG. Call after the copy was submitted.
    pub fn save(self, device: &wgpu::Device) -> Result<PathBuf, ScreenshotError> {
        let pixels = self.read_rgba(device)?;
        image::save_buffer(&self.path, &pixels, self.width, self.height, image::ColorType::Rgba8).map_err(|source| {
            ScreenshotError::Encode {
                path: self.path.clone(),
                source,
            }
        })?;
        log::info!("Saved screenshot to {:?}", self.path);
        Ok(self.path)
    }
}
