use glam::UVec2;

use crate::SCREEN_TILE_DIM;

/// Value a solution-tile entry holds when no manifold solution was stored in
/// it; solution tiles are filled with this value before each prior build.
pub const SOLUTION_TILE_SENTINEL: u32 = u32::MAX;

/// Number of solution slots reserved per tile pixel.
pub const SOLUTIONS_PER_PIXEL: usize = 4;

/// Number of solution slots in a single screen tile.
pub const SOLUTION_TILE_LEN: usize = SOLUTIONS_PER_PIXEL
    * (SCREEN_TILE_DIM.x as usize)
    * (SCREEN_TILE_DIM.y as usize);

/// Returns the index of the first solution slot belonging to the tile that
/// contains given pixel.
pub fn solution_tile_offset(pixel: UVec2, screen_tiles: UVec2) -> usize {
    let tile = pixel / SCREEN_TILE_DIM;
    let tile_idx =
        (tile.y as usize) * (screen_tiles.x as usize) + (tile.x as usize);

    tile_idx * SOLUTION_TILE_LEN
}
