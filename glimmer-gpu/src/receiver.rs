use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4, Vec4Swizzles};

/// Per-pixel shading context produced by the receiver trace and shared,
/// read-only, by every resampling pass within a frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ReceiverInfo {
    /// Receiver position (xyz); `w` is `1.0` for valid receivers.
    pub position: Vec4,

    /// Shading normal (xyz) and roughness (w).
    pub normal: Vec4,

    /// Direction towards the camera (xyz) and material id bits (w).
    pub wo: Vec4,
}

impl ReceiverInfo {
    pub fn new(
        position: Vec3,
        normal: Vec3,
        roughness: f32,
        wo: Vec3,
        material_id: u32,
    ) -> Self {
        Self {
            position: position.extend(1.0),
            normal: normal.extend(roughness),
            wo: wo.extend(f32::from_bits(material_id)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.position.w > 0.0
    }

    pub fn position(&self) -> Vec3 {
        self.position.xyz()
    }

    pub fn normal(&self) -> Vec3 {
        self.normal.xyz()
    }

    pub fn roughness(&self) -> f32 {
        self.normal.w
    }

    pub fn material_id(&self) -> u32 {
        self.wo.w.to_bits()
    }
}
