//! Push-constant blocks of each kernel.

use bytemuck::{Pod, Zeroable};
use glam::UVec2;

/// Bit flags shared by the pass params below.
pub struct PassFlags;

impl PassFlags {
    pub const CALCULATE_COUNTERS: u32 = 1 << 0;
    pub const USE_DIRECTIONAL: u32 = 1 << 1;
    pub const USE_GUIDED_SAMPLING: u32 = 1 << 2;
    pub const USE_CONSTRAINT: u32 = 1 << 3;
    pub const USE_TILING: u32 = 1 << 4;
    pub const USE_PRIOR: u32 = 1 << 5;
    pub const USE_BOUND_PROB: u32 = 1 << 6;

    pub fn has(flags: u32, flag: u32) -> bool {
        flags & flag != 0
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct TraceReceiversPassParams {
    pub frame_dim: UVec2,
    pub frame: u32,
    pub max_depth: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct WriteEnvImportancePassParams {
    pub importance_map_dim: UVec2,
    pub num_blocks: UVec2,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct BuildPriorPassParams {
    pub frame_dim: UVec2,
    pub image_block_dim: UVec2,
    pub env_map_blocks: UVec2,
    pub frame: u32,
    pub pass_id: u32,
    pub num_tiles_x: u32,
    pub num_threads_used: u32,
    pub flags: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct InitialSamplingPassParams {
    pub frame_dim: UVec2,
    pub image_block_dim: UVec2,
    pub env_map_blocks: UVec2,
    pub importance_map_dim: UVec2,
    pub frame: u32,
    pub pass_id: u32,
    pub num_tiles_x: u32,
    pub uniform_threshold: u32,
    pub prior_threshold: u32,
    pub alpha: f32,
    pub flags: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct TemporalResamplingPassParams {
    pub frame_dim: UVec2,
    pub frame: u32,
    pub pass_id: u32,
    pub history_length: f32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct SpatialResamplingPassParams {
    pub frame_dim: UVec2,
    pub frame: u32,
    pub pass_id: u32,
    pub neighbor_count: u32,
    pub gather_radius: f32,

    /// Maximum number of shift-mapping iterations; negative means unbounded.
    pub reuse_max_iterations: i32,

    pub neighbor_offset_count: u32,
    pub flags: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct ResolvePassParams {
    pub frame_dim: UVec2,
    pub frame: u32,
    pub num_passes: u32,
    pub flags: u32,
    pub _pad: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        let flags = PassFlags::USE_PRIOR | PassFlags::CALCULATE_COUNTERS;

        assert!(PassFlags::has(flags, PassFlags::USE_PRIOR));
        assert!(PassFlags::has(flags, PassFlags::CALCULATE_COUNTERS));
        assert!(!PassFlags::has(flags, PassFlags::USE_TILING));
    }
}
