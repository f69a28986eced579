use bytemuck::{Pod, Zeroable};
use glam::UVec2;

/// Parameter block exposed to downstream consumers (e.g. the path tracer
/// that composes the final image) together with the final-throughput image.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ReStirParams {
    pub use_fixed_seed: u32,
    pub fixed_seed: u32,
    pub lod_bias: f32,
    pub specular_roughness_threshold: f32,
    pub frame_dim: UVec2,
    pub screen_tiles: UVec2,
    pub frame_count: u32,
    pub seed: u32,
    pub _pad: UVec2,
}
