use derivative::Derivative;
use glam::{UVec2, UVec3};

use crate::{gpu, Backend};

/// Everything stages need to know about the frame being rendered.
///
/// Built once per frame by [`crate::Pipeline::begin_frame()`] and passed by
/// reference into every stage, so all of them observe the same frame index,
/// dimensions and tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameState {
    pub frame: gpu::Frame,
    pub frame_dim: UVec2,
    pub screen_tiles: UVec2,
    pub seed: u32,
    pub calculate_counters: bool,
}

impl FrameState {
    /// Number of elements tile-aligned, per-pixel buffers must hold.
    pub fn element_count(&self) -> usize {
        gpu::tile_aligned_len(self.screen_tiles)
    }

    /// Invocations covering all of the screen tiles.
    pub fn tile_threads(&self) -> UVec3 {
        (self.screen_tiles * gpu::SCREEN_TILE_DIM).extend(1)
    }

    /// Invocations covering the frame, one per pixel.
    pub fn pixel_threads(&self) -> UVec3 {
        self.frame_dim.extend(1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStage {
    Idle,
    Begun,
    ReceiverTraced,
    Resampling { pass: usize },
    Resolved,

    /// A frame has failed midway; the pipeline cannot be used anymore.
    Faulted,
}

/// Per-frame, read-only inputs produced by other renderers.
#[derive(Derivative)]
#[derivative(Clone(bound = ""), Copy(bound = ""), Debug(bound = ""))]
pub struct FrameInputs<'a, B>
where
    B: Backend,
{
    pub vbuffer: &'a B::Texture,
    pub motion_vectors: &'a B::Texture,
}
