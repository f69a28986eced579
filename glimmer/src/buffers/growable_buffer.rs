use std::mem;

use bytemuck::Pod;
use derivative::Derivative;
use log::info;

use crate::{Backend, Error, Result};

/// Storage buffer of `element_size`-sized elements that grows on demand and
/// never shrinks.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct GrowableBuffer<B>
where
    B: Backend,
{
    label: String,
    element_size: usize,
    buffer: Option<B::Buffer>,
    capacity: usize,
}

impl<B> GrowableBuffer<B>
where
    B: Backend,
{
    pub fn new(label: impl ToString, element_size: usize) -> Self {
        Self {
            label: label.to_string(),
            element_size,
            buffer: None,
            capacity: 0,
        }
    }

    /// Creates a buffer of `T`s.
    pub fn of<T>(label: impl ToString) -> Self
    where
        T: Pod,
    {
        Self::new(label, mem::size_of::<T>())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of elements this buffer can hold; zero until allocated.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    /// Makes sure the buffer can hold at least `len` elements, reallocating
    /// it if needed.
    ///
    /// Returns whether the buffer got (re)allocated, in which case its
    /// previous contents are gone.
    pub fn ensure(&mut self, backend: &mut B, len: usize) -> Result<bool> {
        let len = len.max(1);

        if self.buffer.is_some() && len <= self.capacity {
            return Ok(false);
        }

        let size = len * self.element_size;

        info!(
            "Growing buffer `{}`; capacity={} -> {}, size={}",
            self.label, self.capacity, len, size
        );

        self.buffer = Some(backend.create_buffer(&self.label, size)?);
        self.capacity = len;

        Ok(true)
    }

    pub fn get(&self) -> Result<&B::Buffer> {
        self.buffer
            .as_ref()
            .ok_or_else(|| Error::Unallocated(self.label.clone()))
    }

    /// Fills entire buffer with given 32-bit word.
    pub fn fill(&self, backend: &mut B, word: u32) -> Result<()> {
        backend.fill_buffer(self.get()?, word)
    }

    /// Writes `items` at given element index.
    pub fn write<T>(
        &self,
        backend: &mut B,
        idx: usize,
        items: &[T],
    ) -> Result<()>
    where
        T: Pod,
    {
        self.check_bounds::<T>(idx, items.len())?;

        backend.write_buffer(
            self.get()?,
            idx * mem::size_of::<T>(),
            bytemuck::cast_slice(items),
        )
    }

    /// Reads first `len` elements back; blocks until all of the work
    /// enqueued so far is finished.
    pub fn read<T>(&self, backend: &mut B, len: usize) -> Result<Vec<T>>
    where
        T: Pod,
    {
        self.check_bounds::<T>(0, len)?;

        let bytes =
            backend.read_buffer(self.get()?, len * mem::size_of::<T>())?;

        Ok(bytes
            .chunks_exact(mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    fn check_bounds<T>(&self, idx: usize, len: usize) -> Result<()> {
        let size = mem::size_of::<T>();
        let capacity = self.capacity * self.element_size;

        if (idx + len) * size > capacity {
            return Err(Error::OutOfBounds {
                label: self.label.clone(),
                offset: idx * size,
                len: len * size,
                capacity,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostBackend;

    #[test]
    fn grows_but_never_shrinks() {
        let mut backend = HostBackend::new();
        let mut target = GrowableBuffer::of::<u32>("test");

        assert!(matches!(target.get(), Err(Error::Unallocated(_))));

        assert!(target.ensure(&mut backend, 0).unwrap());
        assert_eq!(1, target.capacity());

        assert!(target.ensure(&mut backend, 10).unwrap());
        assert!(!target.ensure(&mut backend, 10).unwrap());
        assert!(!target.ensure(&mut backend, 5).unwrap());

        assert_eq!(10, target.capacity());
        assert_eq!(40, target.get().unwrap().size());
        assert_eq!(2, backend.allocated_buffers());
    }

    #[test]
    fn write_and_read() {
        let mut backend = HostBackend::new();
        let mut target = GrowableBuffer::of::<u32>("test");

        target.ensure(&mut backend, 4).unwrap();
        target.fill(&mut backend, 7).unwrap();
        target.write(&mut backend, 2, &[1_u32, 2]).unwrap();

        assert_eq!(
            vec![7, 7, 1, 2],
            target.read::<u32>(&mut backend, 4).unwrap()
        );

        assert!(matches!(
            target.write(&mut backend, 3, &[1_u32, 2]),
            Err(Error::OutOfBounds { offset: 12, .. })
        ));

        assert!(target.read::<u32>(&mut backend, 5).is_err());
    }
}
