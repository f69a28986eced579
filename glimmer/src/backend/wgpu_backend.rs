mod compute_kernel;
mod kernels;

use std::sync::{mpsc, Arc};

use fxhash::FxHashMap;
use glam::UVec2;
use log::{debug, info};
use wgpu::util::DeviceExt;

pub use self::compute_kernel::*;
pub use self::kernels::*;
use crate::{Backend, Error, Result};

/// Backend running on top of `wgpu`.
///
/// Work is recorded into a lazily-opened command encoder and submitted either
/// explicitly (via [`Backend::submit()`]) or implicitly, when a readback needs
/// the results.
#[derive(Debug)]
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    encoder: Option<wgpu::CommandEncoder>,

    /// Buffers filled with a repeated word, copied from by non-zero
    /// [`Backend::fill_buffer()`]s; keyed by that word.
    fill_patterns: FxHashMap<u32, FillPattern>,
}

#[derive(Debug)]
struct FillPattern {
    buffer: wgpu::Buffer,
    size: u64,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            encoder: None,
            fill_patterns: Default::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the command encoder currently being recorded into.
    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;

        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("glimmer_encoder"),
            })
        })
    }

    /// Makes sure there's a pattern buffer of `word`s at least `size` bytes
    /// long.
    fn prepare_fill_pattern(&mut self, word: u32, size: u64) {
        let cached = self.fill_patterns.get(&word).map(|pattern| pattern.size);

        let Some(size) = fill_pattern_size(cached, size) else {
            return;
        };

        info!("Allocating fill pattern; word={word:#x}, size={size}");

        let contents = vec![word; (size / 4) as usize];

        let buffer =
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("glimmer_fill_pattern"),
                    contents: bytemuck::cast_slice(&contents),
                    usage: wgpu::BufferUsages::COPY_SRC,
                });

        self.fill_patterns.insert(word, FillPattern { buffer, size });
    }

    /// Creates a transient buffer holding `contents` and records a copy of it
    /// into `target` at `offset`.
    fn upload(
        &mut self,
        label: &str,
        target: &WgpuBuffer,
        offset: usize,
        contents: &[u8],
    ) -> Result<()> {
        let end = offset + contents.len();

        if end as u64 > target.size
            || offset as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0
            || contents.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0
        {
            return Err(Error::OutOfBounds {
                label: label.into(),
                offset,
                len: contents.len(),
                capacity: target.size as usize,
            });
        }

        if contents.is_empty() {
            return Ok(());
        }

        let staging =
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage: wgpu::BufferUsages::COPY_SRC,
                });

        self.encoder().copy_buffer_to_buffer(
            &staging,
            0,
            &target.buffer,
            offset as u64,
            contents.len() as u64,
        );

        Ok(())
    }
}

impl Backend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;

    fn create_buffer(
        &mut self,
        label: &str,
        size: usize,
    ) -> Result<WgpuBuffer> {
        let size = align(size.max(4) as u64);
        let max_size = self.device.limits().max_buffer_size;

        if size > max_size {
            return Err(Error::Allocation {
                label: label.into(),
                size: size as usize,
                reason: format!(
                    "exceeds device's maximum buffer size of {max_size} bytes"
                ),
            });
        }

        info!("Allocating buffer `{label}`; size={size}");

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Ok(WgpuBuffer {
            buffer: Arc::new(buffer),
            size,
        })
    }

    fn create_texture(
        &mut self,
        label: &str,
        size: UVec2,
    ) -> Result<WgpuTexture> {
        let max_dim = self.device.limits().max_texture_dimension_2d;

        if size.x == 0 || size.y == 0 || size.x > max_dim || size.y > max_dim {
            return Err(Error::Allocation {
                label: label.into(),
                size: (size.x as usize) * (size.y as usize) * 16,
                reason: format!(
                    "texture size {size} is outside of 1..={max_dim}"
                ),
            });
        }

        info!("Allocating texture `{label}`; size={size}");

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: WgpuTexture::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let view = texture.create_view(&Default::default());

        Ok(WgpuTexture {
            texture: Arc::new(texture),
            view: Arc::new(view),
            size,
        })
    }

    fn fill_buffer(&mut self, buffer: &WgpuBuffer, word: u32) -> Result<()> {
        if word == 0 {
            self.encoder().clear_buffer(&buffer.buffer, 0, None);
            return Ok(());
        }

        self.prepare_fill_pattern(word, buffer.size);

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor {
                    label: Some("glimmer_encoder"),
                },
            )
        });

        let pattern = self
            .fill_patterns
            .get(&word)
            .ok_or_else(|| Error::Unallocated("glimmer_fill_pattern".into()))?;

        encoder.copy_buffer_to_buffer(
            &pattern.buffer,
            0,
            &buffer.buffer,
            0,
            buffer.size,
        );

        Ok(())
    }

    fn write_buffer(
        &mut self,
        buffer: &WgpuBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        self.upload("glimmer_upload", buffer, offset, data)
    }

    fn read_buffer(
        &mut self,
        buffer: &WgpuBuffer,
        len: usize,
    ) -> Result<Vec<u8>> {
        if len as u64 > buffer.size {
            return Err(Error::OutOfBounds {
                label: "readback".into(),
                offset: 0,
                len,
                capacity: buffer.size as usize,
            });
        }

        let size = align(len as u64);

        debug!("Reading back {len} bytes");

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glimmer_readback"),
            size: size.max(4),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if size > 0 {
            self.encoder().copy_buffer_to_buffer(
                &buffer.buffer,
                0,
                &staging,
                0,
                size,
            );
        }

        self.submit();

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();

        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| Error::Readback("map_async channel closed".into()))?
            .map_err(|err| Error::Readback(format!("{err:?}")))?;

        let data = slice.get_mapped_range()[..len].to_vec();

        staging.unmap();

        Ok(data)
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }
}

#[derive(Clone, Debug)]
pub struct WgpuBuffer {
    buffer: Arc<wgpu::Buffer>,
    size: u64,
}

impl WgpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Clone, Debug)]
pub struct WgpuTexture {
    texture: Arc<wgpu::Texture>,
    view: Arc<wgpu::TextureView>,
    size: UVec2,
}

impl WgpuTexture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    /// Wraps a texture created outside of the pipeline (e.g. a visibility
    /// buffer produced by another renderer).
    pub fn from_raw(texture: Arc<wgpu::Texture>) -> Self {
        let view = texture.create_view(&Default::default());
        let size = UVec2::new(texture.width(), texture.height());

        Self {
            texture,
            view: Arc::new(view),
            size,
        }
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }
}

/// Returns the size a fill pattern has to be (re)allocated with, or `None`
/// if the cached one is large enough already; patterns only ever grow.
fn fill_pattern_size(cached: Option<u64>, size: u64) -> Option<u64> {
    match cached {
        Some(cached) if cached >= size => None,
        _ => Some(align(size.max(4))),
    }
}

fn align(size: u64) -> u64 {
    let alignment = wgpu::COPY_BUFFER_ALIGNMENT;

    (size + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_patterns_only_grow() {
        assert_eq!(Some(1024), fill_pattern_size(None, 1024));
        assert_eq!(Some(8), fill_pattern_size(None, 6));

        // Filling the same (or a smaller) buffer again reuses the pattern
        assert_eq!(None, fill_pattern_size(Some(1024), 1024));
        assert_eq!(None, fill_pattern_size(Some(1024), 16));

        assert_eq!(Some(4096), fill_pattern_size(Some(1024), 4096));
    }

    #[test]
    fn alignment() {
        assert_eq!(4, align(1));
        assert_eq!(4, align(4));
        assert_eq!(12, align(9));
    }
}
