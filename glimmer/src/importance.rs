use derivative::Derivative;
use glam::UVec2;
use log::{debug, info};

use crate::{
    gpu, Backend, Dispatch, GrowableBuffer, KernelSet, Result,
    WriteEnvImportanceArgs,
};

/// How the environment-importance field is laid out in its buffer: the
/// importance map is split into `blocks`, stored one after another, each in
/// raster order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportanceLayout {
    pub blocks: UVec2,
    pub map_dim: UVec2,
}

impl ImportanceLayout {
    pub fn new(blocks: UVec2, map_dim: UVec2) -> Self {
        Self { blocks, map_dim }
    }

    /// Size of a single block, in texels; the last row / column of blocks
    /// might extend past the map.
    pub fn block_dim(&self) -> UVec2 {
        let blocks = self.blocks.max(UVec2::ONE);

        (self.map_dim + blocks - 1) / blocks
    }

    pub fn block_len(&self) -> usize {
        let dim = self.block_dim();

        (dim.x as usize) * (dim.y as usize)
    }

    pub fn num_blocks(&self) -> usize {
        (self.blocks.x as usize) * (self.blocks.y as usize)
    }

    /// Number of `f32`s the field occupies.
    pub fn len(&self) -> usize {
        self.num_blocks() * self.block_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replaces `values` with their exclusive prefix sums, computed for each
/// `block_len`-sized block independently, i.e. `[a, b, c, d]` becomes
/// `[0, a, a + b, a + b + c]`.
pub fn exclusive_prefix_sum_blocks(values: &mut [f32], block_len: usize) {
    if block_len == 0 {
        return;
    }

    for block in values.chunks_mut(block_len) {
        let mut sum = 0.0;

        for value in block {
            let curr = *value;

            *value = sum;
            sum += curr;
        }
    }
}

/// Per-block CDFs over the environment map's radiance, used to sample
/// environment light directionally.
///
/// The field is built on the host: a kernel writes radiance of each texel,
/// which gets read back, turned into per-block prefix sums and uploaded
/// again. Since that's a round-trip, the field is rebuilt only when its
/// layout changes.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct ImportanceField<B>
where
    B: Backend,
{
    buffer: GrowableBuffer<B>,
    built: Option<ImportanceLayout>,
}

impl<B> ImportanceField<B>
where
    B: Backend,
{
    pub fn new() -> Self {
        Self {
            buffer: GrowableBuffer::of::<f32>("glimmer_env_importance"),
            built: None,
        }
    }

    /// Makes sure the buffer can hold a field of given layout.
    pub fn ensure(
        &mut self,
        backend: &mut B,
        layout: ImportanceLayout,
    ) -> Result<()> {
        if self.buffer.ensure(backend, layout.len())? {
            // Contents are gone together with the previous buffer
            self.built = None;
        }

        Ok(())
    }

    /// Rebuilds the field if its layout has changed since the last build.
    ///
    /// Without an environment map there's nothing to build from; in that case
    /// the layout is not recorded, so that the build gets retried once a map
    /// appears.
    ///
    /// Returns whether the field got rebuilt.
    pub fn update(
        &mut self,
        backend: &mut B,
        kernels: &mut KernelSet<B>,
        layout: ImportanceLayout,
        has_env_map: bool,
    ) -> Result<bool> {
        if self.built == Some(layout) {
            debug!("Environment importance is up to date");
            return Ok(false);
        }

        if !has_env_map {
            debug!("Scene has no environment map; not building importance");
            return Ok(false);
        }

        info!(
            "Building environment importance; blocks={}, map_dim={}",
            layout.blocks, layout.map_dim
        );

        self.ensure(backend, layout)?;

        let buffer = self.buffer.get()?;

        backend.fill_buffer(buffer, 0)?;

        kernels.dispatch(
            backend,
            Dispatch::WriteEnvImportance(WriteEnvImportanceArgs {
                threads: layout.map_dim.extend(1),
                params: gpu::WriteEnvImportancePassParams {
                    importance_map_dim: layout.map_dim,
                    num_blocks: layout.blocks,
                },
                importance: buffer,
            }),
        )?;

        let mut values = self.buffer.read::<f32>(backend, layout.len())?;
        let block_len = layout.block_len();

        exclusive_prefix_sum_blocks(&mut values, block_len);

        for (block_idx, block) in values.chunks(block_len).enumerate() {
            self.buffer.write(backend, block_idx * block_len, block)?;
        }

        self.built = Some(layout);

        Ok(true)
    }

    pub fn get(&self) -> Result<&B::Buffer> {
        self.buffer.get()
    }

    /// Layout of the field currently in the buffer, if any.
    pub fn built(&self) -> Option<ImportanceLayout> {
        self.built
    }
}

impl<B> Default for ImportanceField<B>
where
    B: Backend,
{
    fn default() -> Self {
        Self::new()
    }
}
