use std::cell::{Ref, RefCell};
use std::mem;
use std::rc::Rc;

use bytemuck::Pod;
use glam::{UVec2, Vec4};
use log::trace;

use crate::{Backend, Error, Result};

/// Backend that keeps all of the resources in host memory.
///
/// Kernels dispatched with this backend are plain Rust functions operating on
/// [`HostBuffer`]s and [`HostTexture`]s; that's what tests and headless
/// reference runs use.
#[derive(Debug)]
pub struct HostBackend {
    max_buffer_size: usize,
    allocated_buffers: usize,
    allocated_textures: usize,
    submissions: usize,
}

impl HostBackend {
    pub fn new() -> Self {
        Self {
            max_buffer_size: usize::MAX,
            allocated_buffers: 0,
            allocated_textures: 0,
            submissions: 0,
        }
    }

    /// Makes the backend refuse allocating buffers larger than `size` bytes.
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Number of buffers allocated so far.
    pub fn allocated_buffers(&self) -> usize {
        self.allocated_buffers
    }

    /// Number of textures allocated so far.
    pub fn allocated_textures(&self) -> usize {
        self.allocated_textures
    }

    pub fn submissions(&self) -> usize {
        self.submissions
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HostBackend {
    type Buffer = HostBuffer;
    type Texture = HostTexture;

    fn create_buffer(
        &mut self,
        label: &str,
        size: usize,
    ) -> Result<HostBuffer> {
        if size > self.max_buffer_size {
            return Err(Error::Allocation {
                label: label.into(),
                size,
                reason: format!(
                    "exceeds maximum buffer size of {} bytes",
                    self.max_buffer_size
                ),
            });
        }

        self.allocated_buffers += 1;

        Ok(HostBuffer {
            id: self.allocated_buffers,
            label: label.into(),
            data: Rc::new(RefCell::new(vec![0; size])),
        })
    }

    fn create_texture(
        &mut self,
        label: &str,
        size: UVec2,
    ) -> Result<HostTexture> {
        trace!("Creating host texture `{label}`; size={size}");

        self.allocated_textures += 1;

        Ok(HostTexture::new(size))
    }

    fn fill_buffer(&mut self, buffer: &HostBuffer, word: u32) -> Result<()> {
        for chunk in buffer.data.borrow_mut().chunks_mut(4) {
            chunk.copy_from_slice(&word.to_ne_bytes()[..chunk.len()]);
        }

        Ok(())
    }

    fn write_buffer(
        &mut self,
        buffer: &HostBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        buffer.write_bytes(offset, data)
    }

    fn read_buffer(
        &mut self,
        buffer: &HostBuffer,
        len: usize,
    ) -> Result<Vec<u8>> {
        let data = buffer.data.borrow();

        data.get(..len).map(|data| data.to_vec()).ok_or_else(|| {
            Error::OutOfBounds {
                label: buffer.label.to_string(),
                offset: 0,
                len,
                capacity: data.len(),
            }
        })
    }

    fn submit(&mut self) {
        self.submissions += 1;
    }
}

/// Host-memory buffer; cloning it yields another handle to the same memory.
#[derive(Clone, Debug)]
pub struct HostBuffer {
    id: usize,
    label: Rc<str>,
    data: Rc<RefCell<Vec<u8>>>,
}

impl HostBuffer {
    /// Unique (per backend) identifier of this buffer.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Size of this buffer, in bytes.
    pub fn size(&self) -> usize {
        self.data.borrow().len()
    }

    /// Number of `T`s this buffer can hold.
    pub fn len_of<T>(&self) -> usize {
        self.size() / mem::size_of::<T>()
    }

    pub fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.data.borrow(), |data| data.as_slice())
    }

    pub fn read<T>(&self, idx: usize) -> Result<T>
    where
        T: Pod,
    {
        let size = mem::size_of::<T>();
        let offset = idx * size;
        let data = self.data.borrow();

        data.get(offset..offset + size)
            .map(bytemuck::pod_read_unaligned)
            .ok_or_else(|| Error::OutOfBounds {
                label: self.label.to_string(),
                offset,
                len: size,
                capacity: data.len(),
            })
    }

    /// Reads all of the `T`s this buffer holds.
    pub fn read_all<T>(&self) -> Vec<T>
    where
        T: Pod,
    {
        self.data
            .borrow()
            .chunks_exact(mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    pub fn write<T>(&self, idx: usize, value: T) -> Result<()>
    where
        T: Pod,
    {
        self.write_bytes(idx * mem::size_of::<T>(), bytemuck::bytes_of(&value))
    }

    pub fn write_all<T>(&self, idx: usize, values: &[T]) -> Result<()>
    where
        T: Pod,
    {
        self.write_bytes(
            idx * mem::size_of::<T>(),
            bytemuck::cast_slice(values),
        )
    }

    fn write_bytes(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut data = self.data.borrow_mut();
        let capacity = data.len();

        let Some(target) = data.get_mut(offset..offset + bytes.len()) else {
            return Err(Error::OutOfBounds {
                label: self.label.to_string(),
                offset,
                len: bytes.len(),
                capacity,
            });
        };

        target.copy_from_slice(bytes);

        Ok(())
    }
}

/// Host-memory RGBA32F image; cloning it yields another handle to the same
/// memory.
#[derive(Clone, Debug)]
pub struct HostTexture {
    size: UVec2,
    texels: Rc<RefCell<Vec<Vec4>>>,
}

impl HostTexture {
    pub fn new(size: UVec2) -> Self {
        Self {
            size,
            texels: Rc::new(RefCell::new(vec![
                Vec4::ZERO;
                (size.x as usize) * (size.y as usize)
            ])),
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn load(&self, pos: UVec2) -> Vec4 {
        self.index(pos)
            .map(|idx| self.texels.borrow()[idx])
            .unwrap_or_default()
    }

    pub fn store(&self, pos: UVec2, value: Vec4) -> Result<()> {
        let idx = self.index(pos).ok_or_else(|| Error::OutOfBounds {
            label: "texture".into(),
            offset: (pos.y as usize) * (self.size.x as usize)
                + (pos.x as usize),
            len: 1,
            capacity: self.texels.borrow().len(),
        })?;

        self.texels.borrow_mut()[idx] = value;

        Ok(())
    }

    fn index(&self, pos: UVec2) -> Option<usize> {
        if pos.x < self.size.x && pos.y < self.size.y {
            Some((pos.y as usize) * (self.size.x as usize) + (pos.x as usize))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec2, vec4};

    use super::*;

    #[test]
    fn buffers() {
        let mut backend = HostBackend::new();
        let buffer = backend.create_buffer("test", 16).unwrap();

        assert_eq!(1, backend.allocated_buffers());
        assert_eq!(4, buffer.len_of::<u32>());

        buffer.write(1, 0xcafebabe_u32).unwrap();
        buffer.write_all(2, &[1_u32, 2]).unwrap();

        assert_eq!(vec![0, 0xcafebabe, 1, 2], buffer.read_all::<u32>());
        assert_eq!(2, buffer.read::<u32>(3).unwrap());

        assert!(matches!(
            buffer.write(4, 0_u32),
            Err(Error::OutOfBounds { offset: 16, .. })
        ));

        backend.fill_buffer(&buffer, u32::MAX).unwrap();

        assert_eq!(vec![u32::MAX; 4], buffer.read_all::<u32>());
        assert_eq!(vec![0xff; 8], backend.read_buffer(&buffer, 8).unwrap());
    }

    #[test]
    fn allocation_limit() {
        let mut backend = HostBackend::new().with_max_buffer_size(8);

        assert!(backend.create_buffer("small", 8).is_ok());

        assert!(matches!(
            backend.create_buffer("large", 9),
            Err(Error::Allocation { size: 9, .. })
        ));

        assert_eq!(1, backend.allocated_buffers());
    }

    #[test]
    fn textures() {
        let texture = HostTexture::new(uvec2(2, 2));

        texture.store(uvec2(1, 1), vec4(1.0, 2.0, 3.0, 4.0)).unwrap();

        assert_eq!(vec4(1.0, 2.0, 3.0, 4.0), texture.load(uvec2(1, 1)));
        assert_eq!(Vec4::ZERO, texture.load(uvec2(0, 1)));
        assert_eq!(Vec4::ZERO, texture.load(uvec2(5, 5)));
        assert!(texture.store(uvec2(2, 0), Vec4::ONE).is_err());
    }
}
