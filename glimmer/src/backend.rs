mod host;
#[cfg(feature = "wgpu")]
mod wgpu_backend;

use std::fmt::Debug;

use glam::UVec2;

pub use self::host::*;
#[cfg(feature = "wgpu")]
pub use self::wgpu_backend::*;
use crate::Result;

/// Device services the pipeline is built upon.
///
/// All operations are enqueued in call order - an operation never observes
/// partial results of a preceding one, and a readback observes everything
/// enqueued before it.
pub trait Backend {
    type Buffer: Debug;
    type Texture: Debug;

    /// Allocates a storage buffer of given size, in bytes.
    ///
    /// Allocation failures are fatal - callers propagate them without
    /// retrying.
    fn create_buffer(&mut self, label: &str, size: usize)
        -> Result<Self::Buffer>;

    /// Allocates an RGBA32F texture that kernels can both read and write.
    fn create_texture(
        &mut self,
        label: &str,
        size: UVec2,
    ) -> Result<Self::Texture>;

    /// Fills entire buffer with given 32-bit word.
    fn fill_buffer(&mut self, buffer: &Self::Buffer, word: u32) -> Result<()>;

    /// Copies `data` into the buffer, starting at `offset` bytes.
    fn write_buffer(
        &mut self,
        buffer: &Self::Buffer,
        offset: usize,
        data: &[u8],
    ) -> Result<()>;

    /// Reads first `len` bytes of the buffer back into host memory; blocks
    /// until all of the work enqueued so far is finished.
    fn read_buffer(
        &mut self,
        buffer: &Self::Buffer,
        len: usize,
    ) -> Result<Vec<u8>>;

    /// Submits the work enqueued so far.
    fn submit(&mut self);
}
