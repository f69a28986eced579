//! Plain-old-data structs shared between Glimmer's orchestrator and the
//! kernels it dispatches.
//!
//! Everything in here is `#[repr(C)]` + [`bytemuck::Pod`], so that it can be
//! uploaded as-is into storage buffers or push constants.

#![allow(clippy::len_without_is_empty)]

mod counters;
mod frame;
mod passes;
mod receiver;
mod reservoir;
mod restir_params;
mod solution_tiles;
mod specular_shape;

use glam::UVec2;

pub use self::counters::*;
pub use self::frame::*;
pub use self::passes::*;
pub use self::receiver::*;
pub use self::reservoir::*;
pub use self::restir_params::*;
pub use self::solution_tiles::*;
pub use self::specular_shape::*;

/// Maximum number of independent resampling passes per frame.
pub const MAX_PASSES: usize = 4;

/// Size of a screen tile, in pixels; tile-aligned buffers are sized as
/// `number of tiles * SCREEN_TILE_DIM.x * SCREEN_TILE_DIM.y`.
pub const SCREEN_TILE_DIM: UVec2 = UVec2::new(16, 16);

/// Number of entries in the neighbor-offset table used by spatial
/// resampling.
pub const NEIGHBOR_OFFSET_COUNT: usize = 8192;

/// Returns the number of tile-aligned pixels covered by given screen tiles.
pub fn tile_aligned_len(screen_tiles: UVec2) -> usize {
    (screen_tiles.x as usize)
        * (screen_tiles.y as usize)
        * (SCREEN_TILE_DIM.x as usize)
        * (SCREEN_TILE_DIM.y as usize)
}
