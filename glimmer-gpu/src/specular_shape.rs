use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Caustic-capable piece of geometry, as seen by the manifold solver.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpecularShape {
    pub aabb_min: Vec3,
    pub material_id: u32,
    pub aabb_max: Vec3,
    pub is_uv_space_sampling: u32,
}

impl SpecularShape {
    pub fn new(
        material_id: u32,
        aabb_min: Vec3,
        aabb_max: Vec3,
        is_uv_space_sampling: bool,
    ) -> Self {
        Self {
            aabb_min,
            material_id,
            aabb_max,
            is_uv_space_sampling: is_uv_space_sampling as u32,
        }
    }

    pub fn uses_uv_space_sampling(&self) -> bool {
        self.is_uv_space_sampling != 0
    }
}
